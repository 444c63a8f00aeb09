//! Frame sequence detection and grouping
//!
//! File names ending in a run of digits (`render.0001.exr`) are frame
//! numbered. Files that share directory, prefix, extension and padding are
//! collected into one [`SequenceEntry`] whose frames print as a compact
//! range list (`render.0001-0100.exr`).

use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::trace;

/// Trailing frame number of a base name
static FRAME_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Trailing frame list of a sequence argument, e.g. `1-10,12,20-30`
static RANGE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn frame_pattern() -> &'static Regex {
    FRAME_PATTERN.get_or_init(|| Regex::new(r"^(.*?)([0-9]+)$").unwrap())
}

fn range_pattern() -> &'static Regex {
    RANGE_PATTERN.get_or_init(|| {
        Regex::new(r"^(.*?)([0-9]+(?:-[0-9]+)?(?:,[0-9]+(?:-[0-9]+)?)*)$").unwrap()
    })
}

/// Padding implied by a printed frame number: its width when written with a
/// leading zero, otherwise 0 (no enforced width)
fn padding_of(digits: &str) -> usize {
    if digits.len() > 1 && digits.starts_with('0') {
        digits.len()
    } else {
        0
    }
}

/// Split a file name into base name and extension
///
/// The extension starts at the last dot unless that dot opens the name.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

/// One concrete file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub directory: PathBuf,
    pub base_name: String,
    pub frame_number: Option<u64>,
    pub frame_padding: usize,
    /// Extension including its leading dot, empty when absent
    pub extension: String,
    digits: usize,
}

impl PathEntry {
    /// Parse a file name found in `directory`
    pub fn new(directory: impl Into<PathBuf>, file_name: &str) -> Self {
        let (base, extension) = split_extension(file_name);

        let mut frame_number = None;
        let mut frame_padding = 0;
        let mut digits = 0;
        if let Some(caps) = frame_pattern().captures(base) {
            let run = &caps[2];
            // Runs too long for u64 are not frame numbers
            if let Ok(value) = run.parse::<u64>() {
                frame_number = Some(value);
                frame_padding = padding_of(run);
                digits = run.len();
            }
        }

        Self {
            directory: directory.into(),
            base_name: base.to_string(),
            frame_number,
            frame_padding,
            extension: extension.to_string(),
            digits,
        }
    }

    /// Parse a path, splitting off its directory
    pub fn from_path(path: &Path) -> Self {
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(directory, &file_name)
    }

    /// Base name with the frame run removed
    pub fn prefix(&self) -> &str {
        &self.base_name[..self.base_name.len() - self.digits]
    }

    /// Number of digits in the frame run (0 without a frame number)
    pub fn digit_count(&self) -> usize {
        self.digits
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.base_name, self.extension)
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }

    /// Key shared by all files that may belong to the same sequence
    pub fn key(&self) -> SequenceKey {
        SequenceKey {
            directory: self.directory.clone(),
            base_name_prefix: self.prefix().to_string(),
            base_name_suffix: String::new(),
            extension: self.extension.clone(),
        }
    }
}

/// A path entry with its frame number stripped
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceKey {
    pub directory: PathBuf,
    pub base_name_prefix: String,
    pub base_name_suffix: String,
    pub extension: String,
}

/// The unit that gets probed and reported: a single file or a frame sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    pub key: SequenceKey,
    /// Ascending, unique and never empty
    pub frame_numbers: BTreeSet<u64>,
    pub padding: usize,
    /// False for files without a frame number; their frame set is `{0}`
    pub numbered: bool,
}

impl SequenceEntry {
    /// A file without a frame number
    pub fn single(entry: &PathEntry) -> Self {
        Self {
            key: SequenceKey {
                directory: entry.directory.clone(),
                base_name_prefix: entry.base_name.clone(),
                base_name_suffix: String::new(),
                extension: entry.extension.clone(),
            },
            frame_numbers: BTreeSet::from([0]),
            padding: 0,
            numbered: false,
        }
    }

    pub fn len(&self) -> usize {
        self.frame_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_numbers.is_empty()
    }

    /// More than one frame on disk
    pub fn is_sequence(&self) -> bool {
        self.numbered && self.frame_numbers.len() > 1
    }

    pub fn first_frame(&self) -> u64 {
        self.frame_numbers.first().copied().unwrap_or(0)
    }

    pub fn last_frame(&self) -> u64 {
        self.frame_numbers.last().copied().unwrap_or(0)
    }

    /// Maximal contiguous runs of frame numbers, ascending
    pub fn runs(&self) -> Vec<(u64, u64)> {
        let mut runs: Vec<(u64, u64)> = Vec::new();
        for &frame in &self.frame_numbers {
            match runs.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(frame) => *end = frame,
                _ => runs.push((frame, frame)),
            }
        }
        runs
    }

    fn pad(&self, frame: u64) -> String {
        format!("{:0width$}", frame, width = self.padding)
    }

    /// Frame list such as `0001-0100` or `1-2,5`
    pub fn frame_range_text(&self) -> String {
        self.runs()
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    self.pad(start)
                } else {
                    format!("{}-{}", self.pad(start), self.pad(end))
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Name as reported, e.g. `image.1-100.sgi`
    pub fn file_name(&self) -> String {
        let frames = if self.numbered {
            self.frame_range_text()
        } else {
            String::new()
        };
        format!(
            "{}{}{}{}",
            self.key.base_name_prefix, frames, self.key.base_name_suffix, self.key.extension
        )
    }

    /// Directory joined with [`SequenceEntry::file_name`]
    pub fn display_path(&self) -> PathBuf {
        self.key.directory.join(self.file_name())
    }

    /// Path of the file holding `frame`
    pub fn frame_path(&self, frame: u64) -> PathBuf {
        if !self.numbered {
            return self.display_path();
        }
        self.key.directory.join(format!(
            "{}{}{}{}",
            self.key.base_name_prefix,
            self.pad(frame),
            self.key.base_name_suffix,
            self.key.extension
        ))
    }

    /// Path of the first file of the entry
    pub fn first_path(&self) -> PathBuf {
        self.frame_path(self.first_frame())
    }
}

impl Ord for SequenceEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .directory
            .cmp(&other.key.directory)
            .then_with(|| self.key.base_name_prefix.cmp(&other.key.base_name_prefix))
            .then_with(|| self.key.extension.cmp(&other.key.extension))
            .then_with(|| self.first_frame().cmp(&other.first_frame()))
            .then_with(|| self.key.base_name_suffix.cmp(&other.key.base_name_suffix))
            .then_with(|| self.numbered.cmp(&other.numbered))
            .then_with(|| self.padding.cmp(&other.padding))
            .then_with(|| self.frame_numbers.cmp(&other.frame_numbers))
    }
}

impl PartialOrd for SequenceEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Frames collected for one key while scanning
#[derive(Debug, Default)]
struct Bucket {
    /// Frames written with leading zeros, by width
    padded: BTreeMap<usize, BTreeSet<u64>>,
    /// Frames without leading zeros, with their digit count
    unpadded: Vec<(u64, usize)>,
}

/// Keyed accumulator turning path entries into sequence entries
///
/// Ranges can only be fixed once every file has been seen, so entries are
/// bucketed by [`SequenceKey`] while scanning and split into sequences by
/// [`SequenceGrouper::finish`].
#[derive(Debug, Default)]
pub struct SequenceGrouper {
    buckets: BTreeMap<SequenceKey, Bucket>,
    singles: BTreeMap<SequenceKey, SequenceEntry>,
}

impl SequenceGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PathEntry) {
        let Some(frame) = entry.frame_number else {
            let single = SequenceEntry::single(&entry);
            self.singles.entry(single.key.clone()).or_insert(single);
            return;
        };

        let bucket = self.buckets.entry(entry.key()).or_default();
        if entry.frame_padding > 0 {
            bucket
                .padded
                .entry(entry.frame_padding)
                .or_default()
                .insert(frame);
        } else {
            bucket.unpadded.push((frame, entry.digit_count()));
        }
    }

    /// Split every bucket into sequences and return them sorted
    ///
    /// A frame printed without leading zeros joins the padded sequence whose
    /// width equals its digit count; otherwise it belongs to the unpadded
    /// sequence. The same value printed with different padding never merges.
    pub fn finish(self) -> Vec<SequenceEntry> {
        let mut entries: Vec<SequenceEntry> = self.singles.into_values().collect();

        for (key, bucket) in self.buckets {
            let Bucket {
                mut padded,
                unpadded,
            } = bucket;

            let mut plain = BTreeSet::new();
            for (frame, digits) in unpadded {
                match padded.get_mut(&digits) {
                    Some(frames) => {
                        frames.insert(frame);
                    }
                    None => {
                        plain.insert(frame);
                    }
                }
            }
            if !plain.is_empty() {
                padded.insert(0, plain);
            }

            for (padding, frame_numbers) in padded {
                trace!(
                    prefix = %key.base_name_prefix,
                    padding,
                    frames = frame_numbers.len(),
                    "Grouped sequence"
                );
                entries.push(SequenceEntry {
                    key: key.clone(),
                    frame_numbers,
                    padding,
                    numbered: true,
                });
            }
        }

        entries.sort();
        entries
    }
}

/// Group path entries into sorted sequence entries
pub fn group<I>(entries: I) -> Vec<SequenceEntry>
where
    I: IntoIterator<Item = PathEntry>,
{
    let mut grouper = SequenceGrouper::new();
    for entry in entries {
        grouper.push(entry);
    }
    grouper.finish()
}

/// A sequence typed on the command line, e.g. `image.1-100.sgi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePattern {
    pub directory: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub padding: usize,
    /// Inclusive frame ranges
    pub ranges: Vec<(u64, u64)>,
}

impl SequencePattern {
    /// Parse the frame list at the end of the base name of `path`
    pub fn parse(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let (base, extension) = split_extension(file_name);
        let caps = range_pattern().captures(base)?;
        let prefix = caps.get(1)?.as_str();
        let list = caps.get(2)?.as_str();

        let mut padding = 0;
        let mut ranges = Vec::new();
        for item in list.split(',') {
            let (start, end) = item.split_once('-').unwrap_or((item, item));
            padding = padding.max(padding_of(start)).max(padding_of(end));
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            ranges.push((start.min(end), start.max(end)));
        }

        Some(Self {
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            padding,
            ranges,
        })
    }

    /// Whether a file listed in the pattern's directory is one of its frames
    pub fn matches(&self, entry: &PathEntry) -> bool {
        let Some(frame) = entry.frame_number else {
            return false;
        };
        let padding_ok = if self.padding == 0 {
            entry.frame_padding == 0
        } else {
            entry.frame_padding == self.padding
                || (entry.frame_padding == 0 && entry.digit_count() == self.padding)
        };
        padding_ok
            && entry.prefix() == self.prefix
            && entry.extension == self.extension
            && self
                .ranges
                .iter()
                .any(|&(start, end)| (start..=end).contains(&frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<PathEntry> {
        names.iter().map(|n| PathEntry::new("shots", n)).collect()
    }

    #[test]
    fn test_path_entry_frame_detection() {
        let entry = PathEntry::new("dir", "render.0042.exr");
        assert_eq!(entry.base_name, "render.0042");
        assert_eq!(entry.extension, ".exr");
        assert_eq!(entry.frame_number, Some(42));
        assert_eq!(entry.frame_padding, 4);
        assert_eq!(entry.prefix(), "render.");

        let entry = PathEntry::new("dir", "render.100.exr");
        assert_eq!(entry.frame_number, Some(100));
        assert_eq!(entry.frame_padding, 0);

        let entry = PathEntry::new("dir", "0.dpx");
        assert_eq!(entry.frame_number, Some(0));
        assert_eq!(entry.frame_padding, 0);
        assert_eq!(entry.prefix(), "");

        let entry = PathEntry::new("dir", "movie.mov");
        assert_eq!(entry.frame_number, None);
        assert_eq!(entry.prefix(), "movie");
    }

    #[test]
    fn test_path_entry_dot_names() {
        let entry = PathEntry::new("dir", ".hidden");
        assert_eq!(entry.base_name, ".hidden");
        assert_eq!(entry.extension, "");

        let entry = PathEntry::new("dir", ".cache.12.png");
        assert_eq!(entry.frame_number, Some(12));
        assert_eq!(entry.prefix(), ".cache.");
        assert_eq!(entry.extension, ".png");

        let entry = PathEntry::new("dir", "frame0007");
        assert_eq!(entry.extension, "");
        assert_eq!(entry.frame_number, Some(7));
        assert_eq!(entry.frame_padding, 4);
    }

    #[test]
    fn test_overlong_digit_run_is_not_a_frame() {
        let entry = PathEntry::new("dir", "id123456789012345678901234567890.png");
        assert_eq!(entry.frame_number, None);
        assert_eq!(entry.prefix(), entry.base_name);
    }

    #[test]
    fn test_padded_sequence_collapses() {
        let names: Vec<String> = (1..=100).map(|i| format!("name.{:03}.ext", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let grouped = group(entries(&names));

        assert_eq!(grouped.len(), 1);
        let seq = &grouped[0];
        assert_eq!(seq.padding, 3);
        assert_eq!(seq.frame_numbers, (1..=100).collect());
        assert_eq!(seq.file_name(), "name.001-100.ext");
        assert!(seq.is_sequence());
    }

    #[test]
    fn test_padding_mismatch_never_merges() {
        let grouped = group(entries(&["a.1.ext", "a.01.ext"]));
        assert_eq!(grouped.len(), 2);
        let names: Vec<String> = grouped.iter().map(SequenceEntry::file_name).collect();
        assert!(names.contains(&"a.1.ext".to_string()));
        assert!(names.contains(&"a.01.ext".to_string()));
    }

    #[test]
    fn test_unpadded_wide_frames_join_padded_group() {
        let grouped = group(entries(&["s.98.ext", "s.099.ext", "s.100.ext", "s.101.ext"]));
        assert_eq!(grouped.len(), 2);
        let padded = grouped.iter().find(|e| e.padding == 3).unwrap();
        assert_eq!(padded.frame_numbers, BTreeSet::from([99, 100, 101]));
        let plain = grouped.iter().find(|e| e.padding == 0).unwrap();
        assert_eq!(plain.frame_numbers, BTreeSet::from([98]));
    }

    #[test]
    fn test_gaps_render_as_runs() {
        let grouped = group(entries(&["f.1.ext", "f.2.ext", "f.5.ext"]));
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].runs(), vec![(1, 2), (5, 5)]);
        assert_eq!(grouped[0].frame_range_text(), "1-2,5");
        assert_eq!(grouped[0].file_name(), "f.1-2,5.ext");
    }

    #[test]
    fn test_single_member_keeps_literal_name() {
        let grouped = group(entries(&["shot.0010.exr", "notes.txt"]));
        let names: Vec<String> = grouped.iter().map(SequenceEntry::file_name).collect();
        assert_eq!(names, vec!["notes.txt", "shot.0010.exr"]);
        assert!(grouped.iter().all(|e| !e.is_sequence()));
        assert_eq!(grouped[1].first_path(), PathBuf::from("shots/shot.0010.exr"));
    }

    #[test]
    fn test_digit_only_names_group_by_extension() {
        let grouped = group(entries(&["0001.dpx", "0002.dpx", "0001.exr"]));
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].file_name(), "0001-0002.dpx");
        assert_eq!(grouped[1].file_name(), "0001.exr");
    }

    #[test]
    fn test_directories_are_separate_keys() {
        let mut all = vec![PathEntry::new("a", "x.1.png"), PathEntry::new("b", "x.2.png")];
        all.push(PathEntry::new("a", "x.2.png"));
        let grouped = group(all);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].display_path(), PathBuf::from("a/x.1-2.png"));
        assert_eq!(grouped[1].display_path(), PathBuf::from("b/x.2.png"));
    }

    #[test]
    fn test_duplicate_files_are_counted_once() {
        let grouped = group(entries(&["c.1.tga", "c.1.tga", "c.2.tga", "plate.tga", "plate.tga"]));
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].frame_numbers.len(), 2);
    }

    #[test]
    fn test_sort_order() {
        let grouped = group(entries(&[
            "b.1.png", "a.5.png", "a.1.png", "a.2.png", "a.png", "a.10.jpg",
        ]));
        let names: Vec<String> = grouped.iter().map(SequenceEntry::file_name).collect();
        assert_eq!(names, vec!["a.png", "a.10.jpg", "a.1-2,5.png", "b.1.png"]);
    }

    #[test]
    fn test_frame_path_uses_padding() {
        let grouped = group(entries(&["r.0008.exr", "r.0009.exr", "r.0010.exr"]));
        assert_eq!(grouped[0].frame_path(9), PathBuf::from("shots/r.0009.exr"));
        assert_eq!(grouped[0].first_path(), PathBuf::from("shots/r.0008.exr"));
    }

    #[test]
    fn test_sequence_pattern_parse() {
        let pattern = SequencePattern::parse(Path::new("pics/image.1-100.sgi")).unwrap();
        assert_eq!(pattern.directory, PathBuf::from("pics"));
        assert_eq!(pattern.prefix, "image.");
        assert_eq!(pattern.extension, ".sgi");
        assert_eq!(pattern.padding, 0);
        assert_eq!(pattern.ranges, vec![(1, 100)]);

        let pattern = SequencePattern::parse(Path::new("render0001-0010,0020.exr")).unwrap();
        assert_eq!(pattern.prefix, "render");
        assert_eq!(pattern.padding, 4);
        assert_eq!(pattern.ranges, vec![(1, 10), (20, 20)]);

        assert!(SequencePattern::parse(Path::new("movie.mov")).is_none());
    }

    #[test]
    fn test_sequence_pattern_matches() {
        let pattern = SequencePattern::parse(Path::new("image.1-3.sgi")).unwrap();
        assert!(pattern.matches(&PathEntry::new("", "image.2.sgi")));
        assert!(!pattern.matches(&PathEntry::new("", "image.4.sgi")));
        assert!(!pattern.matches(&PathEntry::new("", "image.02.sgi")));
        assert!(!pattern.matches(&PathEntry::new("", "other.2.sgi")));
        assert!(!pattern.matches(&PathEntry::new("", "image.2.rgb")));

        let pattern = SequencePattern::parse(Path::new("r.098-100.exr")).unwrap();
        assert!(pattern.matches(&PathEntry::new("", "r.099.exr")));
        assert!(pattern.matches(&PathEntry::new("", "r.100.exr")));
        assert!(!pattern.matches(&PathEntry::new("", "r.99.exr")));
    }
}
