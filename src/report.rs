//! Report rendering
//!
//! Lays out one line per entry: the name on the left and its image
//! information right-aligned to the configured column, e.g.
//!
//! ```text
//! yesterdayview.mov                       640x424:1.51 RGB U8@12
//! render0001-1000.exr                              00:00:41:16@24
//!     0: beauty                               720x480:1.5 RGBA F16
//! ```

use crate::probe::{BitDepth, LayerInfo, Metadata, PixelFormat};
use crate::sequence::SequenceEntry;
use rust_i18n::t;
use std::io::{self, Write};
use std::path::PathBuf;
use unicode_width::UnicodeWidthStr;

/// Width used when the terminal size is unknown
pub const DEFAULT_COLUMNS: usize = 80;

/// Indentation of layer lines
const LAYER_INDENT: &str = "    ";

/// Formatting options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Print image information (false prints names only)
    pub show_metadata: bool,
    /// Print the expanded block instead of the one-line summary
    pub verbose: bool,
    /// Print full paths instead of file names
    pub show_full_path: bool,
    /// Right edge of the information column; 0 disables alignment
    pub columns: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            show_metadata: true,
            verbose: false,
            show_full_path: false,
            columns: DEFAULT_COLUMNS,
        }
    }
}

/// What is known about an entry when the report is rendered
#[derive(Debug, Clone, PartialEq)]
pub enum EntryInfo {
    /// Metadata was not requested
    NotProbed,
    Resolved(Metadata),
    /// The probe failed; the message is printed in place of metadata
    Failed(String),
}

/// One reported entry
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub entry: SequenceEntry,
    pub info: EntryInfo,
}

/// Width / height rounded to two decimals, trailing zeros trimmed
pub fn format_aspect(width: u32, height: u32) -> String {
    if height == 0 {
        return "0".to_string();
    }
    let text = format!("{:.2}", f64::from(width) / f64::from(height));
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn image_text(width: u32, height: u32, pixel: PixelFormat, depth: BitDepth) -> String {
    format!(
        "{}x{}:{} {} {}",
        width,
        height,
        format_aspect(width, height),
        pixel,
        depth
    )
}

fn layer_text(layer: &LayerInfo) -> String {
    image_text(layer.width, layer.height, layer.pixel_format, layer.bit_depth)
}

/// One-line summary: `720x480:1.5 RGB U8`, plus `@<speed>` when time varying
pub fn compact_text(metadata: &Metadata) -> String {
    let text = image_text(
        metadata.width,
        metadata.height,
        metadata.pixel_format,
        metadata.bit_depth,
    );
    if metadata.is_time_varying() {
        format!("{}@{}", text, metadata.frame_speed)
    } else {
        text
    }
}

/// Turns report items into text lines
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Render all items, sorted by directory, name and first frame
    pub fn render(&self, items: &[ReportItem]) -> Vec<String> {
        let mut sorted: Vec<&ReportItem> = items.iter().collect();
        sorted.sort_by(|a, b| a.entry.cmp(&b.entry));

        let headers = self.options.show_metadata
            && !self.options.show_full_path
            && sorted
                .windows(2)
                .any(|w| w[0].entry.key.directory != w[1].entry.key.directory);

        let mut lines = Vec::new();
        let mut current_dir: Option<&PathBuf> = None;
        for item in sorted {
            if headers && current_dir != Some(&item.entry.key.directory) {
                current_dir = Some(&item.entry.key.directory);
                lines.push(
                    t!(
                        "directory_header",
                        path = item.entry.key.directory.display()
                    )
                    .to_string(),
                );
            }
            self.render_item(item, &mut lines);
        }
        lines
    }

    /// Render and write all items, one line each
    pub fn write_to<W: Write>(&self, items: &[ReportItem], out: &mut W) -> io::Result<()> {
        for line in self.render(items) {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }

    /// Name printed for an entry
    pub fn entry_name(&self, entry: &SequenceEntry) -> String {
        if self.options.show_full_path {
            let path = entry.display_path();
            std::path::absolute(&path)
                .unwrap_or(path)
                .display()
                .to_string()
        } else {
            entry.file_name()
        }
    }

    fn render_item(&self, item: &ReportItem, lines: &mut Vec<String>) {
        let name = self.entry_name(&item.entry);
        if !self.options.show_metadata {
            lines.push(name);
            return;
        }

        match &item.info {
            EntryInfo::NotProbed => lines.push(name),
            EntryInfo::Failed(message) => {
                let text = t!("probe_error", message = message).to_string();
                self.align(&name, &text, lines);
            }
            EntryInfo::Resolved(metadata) if self.options.verbose => {
                self.verbose_block(&name, metadata, lines)
            }
            EntryInfo::Resolved(metadata) if metadata.layers.len() > 1 => {
                let duration = if metadata.is_time_varying() {
                    format!(
                        "{}@{}",
                        metadata.frame_speed.timecode(metadata.frame_count),
                        metadata.frame_speed
                    )
                } else {
                    String::new()
                };
                self.align(&name, &duration, lines);
                for (index, layer) in metadata.layers.iter().enumerate() {
                    let label = format!("{}{}: {}", LAYER_INDENT, index, layer.name);
                    self.align(&label, &layer_text(layer), lines);
                }
            }
            EntryInfo::Resolved(metadata) => self.align(&name, &compact_text(metadata), lines),
        }
    }

    /// Left-align `left` and right-align `right` to the column width
    ///
    /// When both don't fit on one line, `right` moves to the next line at the
    /// same column. With alignment disabled they are joined by one space.
    fn align(&self, left: &str, right: &str, lines: &mut Vec<String>) {
        if right.is_empty() {
            lines.push(left.to_string());
            return;
        }
        let columns = self.options.columns;
        if columns == 0 {
            lines.push(format!("{} {}", left, right));
            return;
        }

        let left_width = left.width();
        let right_width = right.width();
        if left_width + 1 + right_width <= columns {
            let gap = columns - left_width - right_width;
            lines.push(format!("{}{}{}", left, " ".repeat(gap), right));
        } else {
            lines.push(left.to_string());
            let gap = columns.saturating_sub(right_width);
            lines.push(format!("{}{}", " ".repeat(gap), right));
        }
    }

    fn verbose_block(&self, name: &str, metadata: &Metadata, lines: &mut Vec<String>) {
        lines.push(name.to_string());

        let single;
        let layers: &[LayerInfo] = if metadata.layers.is_empty() {
            single = [LayerInfo {
                name: name.to_string(),
                width: metadata.width,
                height: metadata.height,
                pixel_format: metadata.pixel_format,
                bit_depth: metadata.bit_depth,
            }];
            &single
        } else {
            &metadata.layers
        };

        for layer in layers {
            lines.push(t!("verbose_layer", value = layer.name).to_string());
            lines.push(t!("verbose_width", value = layer.width).to_string());
            lines.push(t!("verbose_height", value = layer.height).to_string());
            lines.push(
                t!("verbose_aspect", value = format_aspect(layer.width, layer.height)).to_string(),
            );
            lines.push(
                t!(
                    "verbose_pixel",
                    value = format!("{} {}", layer.pixel_format, layer.bit_depth)
                )
                .to_string(),
            );
        }

        lines.push(t!("verbose_start", value = metadata.frame_start).to_string());
        lines.push(t!("verbose_end", value = metadata.frame_end).to_string());
        lines.push(
            t!(
                "verbose_duration",
                value = format!("{}@{}", metadata.frame_count, metadata.frame_speed)
            )
            .to_string(),
        );
        lines.push(t!("verbose_speed", value = metadata.frame_speed).to_string());
        for (tag, value) in metadata.tags.iter() {
            lines.push(t!("verbose_tag", name = tag, value = value).to_string());
        }
    }
}
