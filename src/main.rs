//! djv_info - Show information about image sequences and movies
//!
//! Lists files and numbered image sequences with their dimensions, pixel
//! type and timing, one aligned line per entry.

use anyhow::{Context, Result};
use chrono::Local;
use djv_info::os::{install_interrupt_handler, interrupt_flag, stderr_ansi};
use djv_info::{Cli, Config, Processor, init_locale};
use rust_i18n::t;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Initialize i18n for this binary
rust_i18n::i18n!("locales", fallback = "en");

fn main() -> Result<()> {
    // Initialize locale based on system settings
    init_locale();

    // Usage errors exit with status 2, --help and --version with 0
    let cli = Cli::try_parse_djv(std::env::args_os()).unwrap_or_else(|e| e.exit());

    if cli.sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let code = run_cli_mode(&cli)?;
    std::process::exit(code);
}

/// Run one listing; the log guard is dropped before the exit code is returned
fn run_cli_mode(cli: &Cli) -> Result<i32> {
    // Bad option values abort before the log file is created
    cli.validate()?;

    let _guard = setup_logging(cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "djv_info starting");

    let exe_dir = get_executable_dir()?;
    let config = load_config(cli, &exe_dir).with_context(|| t!("cli_config_error").to_string())?;
    debug!(?config, "Configuration loaded");

    let cancel = install_interrupt_handler().unwrap_or_else(|e| {
        warn!(error = %e, "Cannot install interrupt handler");
        interrupt_flag()
    });

    let processor = Processor::new(config)?.with_cancel_flag(cancel);
    let report = processor.run()?;

    for line in report.diagnostics() {
        eprintln!("{}", line);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    processor.formatter().write_to(&report.items, &mut out)?;

    if report.interrupted {
        eprintln!("{}", t!("cli_interrupted", count = report.skipped));
    }

    info!(
        entries = report.items.len(),
        exit_code = report.exit_code(),
        "djv_info finished"
    );
    Ok(report.exit_code())
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Log file requested on the command line, if any
fn get_log_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(ref file) = cli.log_file {
        return Some(file.clone());
    }
    let dir = cli.log_dir.as_ref()?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let stem = cli.config_name().unwrap_or_else(|| "djv_info".to_string());
    Some(dir.join(format!("{}_{}.log", stem, timestamp)))
}

/// Resolve config path - supports shorthand syntax
///
/// `-C plates` finds `plates`, `plates.toml`, or `Config/plates.toml` next
/// to the executable.
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    config.validate()?;
    Ok(config)
}

/// Setup logging (stderr, plus an optional file)
///
/// stdout carries the report, so the console layer only shows warnings
/// unless `RUST_LOG` asks for more.
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .from_env_lossy();

    let file_writer = match get_log_path(cli) {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&log_path)
                .with_context(|| format!("Cannot open log file {}", log_path.display()))?;
            Some(tracing_appender::non_blocking(file))
        }
        None => None,
    };

    let ansi = stderr_ansi();
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match file_writer {
        Some((non_blocking, guard)) => {
            if cli.json_log {
                subscriber
                    .with(
                        fmt::layer()
                            .json()
                            .with_ansi(false)
                            .with_writer(non_blocking),
                    )
                    .with(
                        fmt::layer()
                            .with_ansi(ansi)
                            .with_writer(std::io::stderr),
                    )
                    .init();
            } else {
                subscriber
                    .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                    .with(
                        fmt::layer()
                            .with_ansi(ansi)
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            Ok(Some(guard))
        }
        None => {
            if cli.json_log {
                subscriber
                    .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                    .init();
            } else {
                subscriber
                    .with(
                        fmt::layer()
                            .with_ansi(ansi)
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            Ok(None)
        }
    }
}
