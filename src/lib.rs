//! djv_info - Image sequence and movie information
//!
//! This library provides the pieces behind the `djv_info` command:
//! - Walking files, directories and sequence arguments
//! - Grouping numbered frames into sequences with padding awareness
//! - Reading headers with the `image` crate, EXIF and ffprobe
//! - Parallel probing with Rayon
//! - Column-aligned text reports

// Initialize i18n with locale files
rust_i18n::i18n!("locales", fallback = "en");

pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod os;
pub mod probe;
pub mod process;
pub mod report;
pub mod sequence;
pub mod walk;

pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use i18n::init_locale;
pub use probe::{MediaProbe, Metadata, MetadataProbe};
pub use process::{Processor, RunReport};
pub use report::{ReportFormatter, ReportOptions};
pub use sequence::{PathEntry, SequenceEntry, SequenceGrouper};
pub use walk::PathWalker;
