//! Metadata probing
//!
//! A [`MetadataProbe`] turns one [`SequenceEntry`] into [`Metadata`]. The
//! default [`MediaProbe`] reads still image headers in-process and asks
//! FFprobe about movies and anything else:
//! - `still`: image header decoding (dimensions and pixel type)
//! - `tags`: EXIF tags of still images
//! - `ffprobe`: movies and formats unknown to the image decoders

pub mod ffprobe;
pub mod still;
pub mod tags;

use crate::error::{Error, ProbeError, Result};
use crate::sequence::SequenceEntry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Extensions always handed to FFprobe
const MOVIE_EXTENSIONS: &[&str] = &[
    "mov", "mp4", "m4v", "mkv", "avi", "mxf", "webm", "wmv", "flv", "mpg", "mpeg", "3gp",
];

/// Channel layout of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    L,
    LA,
    RGB,
    RGBA,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixelFormat::L => "L",
            PixelFormat::LA => "LA",
            PixelFormat::RGB => "RGB",
            PixelFormat::RGBA => "RGBA",
        })
    }
}

/// Storage type of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    U8,
    U10,
    U12,
    U16,
    F16,
    F32,
}

impl BitDepth {
    /// Integer depth for a bit count, rounding odd widths up
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            0..=8 => BitDepth::U8,
            9..=10 => BitDepth::U10,
            11..=12 => BitDepth::U12,
            _ => BitDepth::U16,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BitDepth::U8 => "U8",
            BitDepth::U10 => "U10",
            BitDepth::U12 => "U12",
            BitDepth::U16 => "U16",
            BitDepth::F16 => "F16",
            BitDepth::F32 => "F32",
        })
    }
}

/// Playback speed as a rational number of frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed {
    pub num: u32,
    pub den: u32,
}

impl Default for Speed {
    fn default() -> Self {
        Self { num: 24, den: 1 }
    }
}

impl Speed {
    pub fn new(num: u32, den: u32) -> Self {
        Self {
            num,
            den: den.max(1),
        }
    }

    /// Rational speed for a decimal rate, recognizing the NTSC rates
    pub fn from_fps(fps: f64) -> Self {
        for base in [24u32, 30, 48, 60, 120] {
            let ntsc = f64::from(base) * 1000.0 / 1001.0;
            if (fps - ntsc).abs() < 0.005 {
                return Self::new(base * 1000, 1001);
            }
        }
        if fps.fract() == 0.0 {
            Self::new(fps as u32, 1)
        } else {
            Self::new((fps * 1000.0).round() as u32, 1000)
        }
    }

    /// Parse FFmpeg's `num/den` notation; `0/0` and malformed values give None
    pub fn parse_ratio(text: &str) -> Option<Self> {
        let (num, den) = text.split_once('/').unwrap_or((text, "1"));
        let num: u32 = num.trim().parse().ok()?;
        let den: u32 = den.trim().parse().ok()?;
        (num > 0 && den > 0).then(|| Self::new(num, den))
    }

    pub fn fps(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// `HH:MM:SS:FF` for a number of frames, counted at the rounded rate
    pub fn timecode(&self, frames: u64) -> String {
        let rate = (self.fps().round() as u64).max(1);
        let ff = frames % rate;
        let total_seconds = frames / rate;
        let ss = total_seconds % 60;
        let mm = (total_seconds / 60) % 60;
        let hh = total_seconds / 3600;
        format!("{:02}:{:02}:{:02}:{:02}", hh, mm, ss, ff)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num % self.den == 0 {
            return write!(f, "{}", self.num / self.den);
        }
        let text = format!("{:.3}", self.fps());
        f.write_str(text.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// Metadata tags in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing the value of an existing name in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn extend(&mut self, other: Tags) {
        for (name, value) in other.0 {
            self.insert(name, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One named layer of a multi-layer file or stream of a movie
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub bit_depth: BitDepth,
}

/// Image or movie properties of one entry
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub bit_depth: BitDepth,
    /// Only filled when the file has more than one layer
    pub layers: Vec<LayerInfo>,
    pub frame_start: u64,
    pub frame_end: u64,
    pub frame_count: u64,
    pub frame_speed: Speed,
    pub tags: Tags,
    pub is_sequence: bool,
}

impl Metadata {
    /// A single still frame
    pub fn still(width: u32, height: u32, pixel_format: PixelFormat, bit_depth: BitDepth) -> Self {
        Self {
            width,
            height,
            pixel_format,
            bit_depth,
            layers: Vec::new(),
            frame_start: 0,
            frame_end: 0,
            frame_count: 1,
            frame_speed: Speed::default(),
            tags: Tags::new(),
            is_sequence: false,
        }
    }

    /// Changes over time (a movie or a multi-frame sequence)
    pub fn is_time_varying(&self) -> bool {
        self.frame_count > 1
    }

    /// Frame range and speed of a file sequence, from the first frame's metadata
    pub fn apply_sequence(&mut self, entry: &SequenceEntry, speed: Speed) {
        self.frame_start = entry.first_frame();
        self.frame_end = entry.last_frame();
        self.frame_count = entry.len() as u64;
        self.frame_speed = speed;
        self.is_sequence = entry.is_sequence();
    }
}

/// Provider of metadata for one entry
pub trait MetadataProbe: Send + Sync {
    fn resolve(&self, entry: &SequenceEntry) -> std::result::Result<Metadata, ProbeError>;
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Default probe: image headers in-process, FFprobe for movies
#[derive(Debug)]
pub struct MediaProbe {
    speed: Speed,
    ffprobe: PathBuf,
    ffprobe_available: OnceLock<bool>,
}

impl MediaProbe {
    /// `speed` is reported for image sequences
    pub fn new(speed: Speed, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            speed,
            ffprobe: ffprobe.into(),
            ffprobe_available: OnceLock::new(),
        }
    }

    /// Check if ffprobe is available (cached)
    fn has_ffprobe(&self) -> bool {
        *self
            .ffprobe_available
            .get_or_init(|| ffprobe::is_available(&self.ffprobe))
    }

    fn probe_movie(&self, path: &Path) -> Result<Metadata> {
        if !self.has_ffprobe() {
            return Err(Error::FfprobeNotFound);
        }
        ffprobe::probe(&self.ffprobe, path)
    }

    fn probe_still(&self, path: &Path) -> Result<Metadata> {
        match still::probe(path) {
            Ok(mut metadata) => {
                match tags::read_exif_tags(path) {
                    Ok(exif_tags) => metadata.tags.extend(exif_tags),
                    Err(e) => trace!(?path, error = %e, "No EXIF tags"),
                }
                Ok(metadata)
            }
            Err(Error::Io(e)) => Err(Error::Probe {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) => {
                debug!(?path, error = %e, "Image decoders failed, trying ffprobe");
                if !self.has_ffprobe() {
                    return Err(Error::UnsupportedFormat {
                        path: path.to_path_buf(),
                    });
                }
                ffprobe::probe(&self.ffprobe, path)
            }
        }
    }
}

impl MetadataProbe for MediaProbe {
    fn resolve(&self, entry: &SequenceEntry) -> Result<Metadata> {
        let path = entry.first_path();
        let ext = extension_of(&path);

        if MOVIE_EXTENSIONS.contains(&ext.as_str()) {
            return self.probe_movie(&path);
        }

        let mut metadata = self.probe_still(&path)?;
        if entry.numbered {
            metadata.apply_sequence(entry, self.speed);
        }
        Ok(metadata)
    }
}
