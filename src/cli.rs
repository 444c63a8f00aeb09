//! CLI argument parsing with clap

use crate::config::Config;
use crate::error::Result;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Single-dash djv spellings and the long option each stands for
const DJV_OPTIONS: &[(&str, &str)] = &[
    ("-x_info", "--x-info"),
    ("-xi", "--x-info"),
    ("-verbose", "--verbose"),
    ("-v", "--verbose"),
    ("-file_path", "--file-path"),
    ("-fp", "--file-path"),
    ("-recurse", "--recurse"),
    ("-r", "--recurse"),
    ("-columns", "--columns"),
    ("-c", "--columns"),
];

const AFTER_HELP: &str = "\
Examples:
  djv_info
      Show information about the files in the current directory
  djv_info yesterdayview.mov
      yesterdayview.mov  640x424:1.51 RGB U8@12
  djv_info render0001-1000.exr
      Show information about an image sequence
  djv_info -x_info -recurse shots
      List the files and sequences below \"shots\" without reading them
  djv_info -columns 0 plates
      Separate names and information with a single space";

/// djv_info - Show information about image sequences and movies
///
/// Lists files, groups numbered frames into sequences and prints
/// dimensions, pixel type and timing for every entry.
#[derive(Parser, Debug)]
#[command(name = "djv_info")]
#[command(author, version, about, long_about = None)]
#[command(after_long_help = AFTER_HELP)]
pub struct Cli {
    /// Files, directories or sequences (e.g. image.1-100.sgi) to inspect
    pub paths: Vec<PathBuf>,

    /// Don't show image information, only file names (-x_info, -xi)
    #[arg(long = "x-info")]
    pub x_info: bool,

    /// Show verbose information (-verbose, -v)
    #[arg(long)]
    pub verbose: bool,

    /// Show file path names (-file_path, -fp)
    #[arg(long)]
    pub file_path: bool,

    /// Descend into sub-directories (-recurse, -r)
    #[arg(long)]
    pub recurse: bool,

    /// Number of columns for formatting output, 0 disables (-columns, -c)
    #[arg(long, value_name = "VALUE")]
    pub columns: Option<usize>,

    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Number of threads reading file headers (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Playback speed reported for image sequences
    #[arg(long, value_name = "FPS")]
    pub speed: Option<f64>,

    /// Only list directory entries with these extensions
    #[arg(short = 'e', long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// ffprobe executable used for movies
    #[arg(long, value_name = "PATH")]
    pub ffprobe: Option<PathBuf>,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE", conflicts_with = "log_dir")]
    pub log_file: Option<PathBuf>,

    /// Write the log to a timestamped file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,
}

/// Rewrite djv-style single-dash options into their long forms
///
/// Everything after a literal `--` is left untouched, so a file really named
/// `-v` can still be passed.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(index, arg)| {
            if index == 0 || passthrough {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }
            match arg.to_str().and_then(|s| {
                DJV_OPTIONS
                    .iter()
                    .find(|(short, _)| *short == s)
                    .map(|(_, long)| *long)
            }) {
                Some(long) => OsString::from(long),
                None => arg,
            }
        })
        .collect()
}

impl Cli {
    /// Parse `args` after normalizing djv spellings
    pub fn try_parse_djv<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// Check option values given on the command line
    ///
    /// Needs no file access, so it runs before logging or config loading.
    pub fn validate(&self) -> Result<()> {
        self.to_config().validate()
    }

    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if !self.paths.is_empty() {
            config.paths = self.paths.clone();
        }
        if self.x_info {
            config.show_metadata = false;
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.file_path {
            config.show_full_path = true;
        }
        if self.recurse {
            config.recurse = true;
        }
        if let Some(columns) = self.columns {
            config.columns = Some(columns);
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        if let Some(ref extensions) = self.extensions {
            config.extensions = extensions.clone();
        }
        if let Some(ref ffprobe) = self.ffprobe {
            config.ffprobe = ffprobe.clone();
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
