//! Configuration types for djv_info

use crate::error::{Error, Result};
use crate::probe::Speed;
use crate::report::ReportOptions;
use crate::walk::PathWalker;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Frame rate assumed for image sequences, matching common film playback
pub const DEFAULT_SPEED: f64 = 24.0;

/// Configuration for an info run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files, directories or sequence arguments to inspect
    pub paths: Vec<PathBuf>,

    /// Show image information (false prints file names only)
    pub show_metadata: bool,

    /// Show the expanded metadata block
    pub verbose: bool,

    /// Print full path names instead of bare file names
    pub show_full_path: bool,

    /// Descend into sub-directories
    pub recurse: bool,

    /// Output width used for alignment (None = terminal width, 0 = no alignment)
    pub columns: Option<usize>,

    /// Number of probe worker threads (0 = auto)
    pub threads: usize,

    /// Playback speed reported for image sequences
    pub speed: f64,

    /// File extensions picked up from directory listings (empty = everything)
    pub extensions: Vec<String>,

    /// ffprobe executable used for movies and formats the image decoders don't know
    pub ffprobe: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: vec![],
            show_metadata: true,
            verbose: false,
            show_full_path: false,
            recurse: false,
            columns: None,
            threads: 0, // Auto-detect
            speed: DEFAULT_SPEED,
            extensions: vec![],
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Config {
    /// Formatting options derived from this configuration
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            show_metadata: self.show_metadata,
            verbose: self.verbose,
            show_full_path: self.show_full_path,
            columns: self
                .columns
                .unwrap_or_else(crate::os::terminal_columns),
        }
    }

    /// Walker over the configured paths
    pub fn path_walker(&self) -> PathWalker {
        PathWalker::new(self.paths.clone(), self.recurse).with_extensions(&self.extensions)
    }

    /// Speed reported for image sequences
    pub fn sequence_speed(&self) -> Speed {
        Speed::from_fps(self.speed)
    }

    /// Reject values that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::InvalidOption(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# djv_info configuration file
# This file uses TOML format (https://toml.io)

# Paths to inspect when none are given on the command line
# An empty list inspects the current directory
paths = []

# Show image information (false prints file names only)
show_metadata = true

# Show the expanded metadata block for every entry
verbose = false

# Print full path names
show_full_path = false

# Recursively descend into sub-directories
recurse = false

# Output width used to align the information column
# Leave unset to use the terminal width; 0 disables alignment
# columns = 80

# Number of threads used to read file headers (0 = auto-detect)
threads = 0

# Playback speed reported for image sequences
speed = 24.0

# Only list directory entries with these extensions (empty = all files)
extensions = ["cin", "dpx", "exr", "jpg", "jpeg", "png", "ppm", "sgi", "rgb", "tga", "tif", "tiff", "mov", "mp4", "mkv", "avi"]

# ffprobe executable used for movies
ffprobe = "ffprobe"
"#
        .to_string()
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}
