//! Info run orchestration with a Rayon probe pool
//!
//! Handles the core logic of:
//! - Walking the input paths
//! - Grouping files into sequences
//! - Probing every entry for metadata in parallel
//! - Handing the ordered results to the report formatter

use crate::config::Config;
use crate::error::{Error, Result};
use crate::probe::{MediaProbe, MetadataProbe};
use crate::report::{EntryInfo, ReportFormatter, ReportItem};
use crate::sequence::{SequenceEntry, SequenceGrouper};
use rayon::prelude::*;
use rust_i18n::t;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, info, span};

/// Outcome of one run, ready to be printed
#[derive(Debug)]
pub struct RunReport {
    /// Entries in report order
    pub items: Vec<ReportItem>,
    /// Non-fatal errors met while walking, in discovery order
    pub errors: Vec<Error>,
    /// User paths that yielded nothing because they could not be read
    pub failed_roots: Vec<PathBuf>,
    /// Files found on disk
    pub files: usize,
    /// Entries dropped because the run was interrupted before probing them
    pub skipped: usize,
    pub interrupted: bool,
}

impl RunReport {
    /// Number of entries whose probe failed
    pub fn failed_entries(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.info, EntryInfo::Failed(_)))
            .count()
    }

    /// Process exit code: 130 when interrupted, 1 when a path was unusable
    ///
    /// Probe failures of single entries don't change the exit code.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if !self.failed_roots.is_empty() {
            1
        } else {
            0
        }
    }

    /// One diagnostic line per walk error
    pub fn diagnostics(&self) -> Vec<String> {
        self.errors.iter().map(diagnostic).collect()
    }
}

/// Single-line, localized description of a walk error
pub fn diagnostic(error: &Error) -> String {
    match error {
        Error::PathUnreadable { path, message } => t!(
            "cannot_read_path",
            path = path.display(),
            message = message
        )
        .to_string(),
        other => other.to_string(),
    }
}

/// Drives walk, grouping, probing and formatting for one configuration
pub struct Processor {
    config: Config,
    probe: Arc<dyn MetadataProbe>,
    cancel: Arc<AtomicBool>,
}

impl Processor {
    /// Create a processor using the default media probe
    pub fn new(config: Config) -> Result<Self> {
        let probe = MediaProbe::new(config.sequence_speed(), config.ffprobe.clone());
        Self::with_probe(config, Arc::new(probe))
    }

    /// Create a processor with a custom metadata provider
    pub fn with_probe(config: Config, probe: Arc<dyn MetadataProbe>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            probe,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Stop starting new probes once `flag` is raised
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Formatter configured from this processor's options
    pub fn formatter(&self) -> ReportFormatter {
        ReportFormatter::new(self.config.report_options())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the pipeline; nothing is printed here
    pub fn run(&self) -> Result<RunReport> {
        let _span = span!(Level::INFO, "processor_run").entered();

        let walker = self.config.path_walker();
        let mut walk = walker.walk();
        let mut grouper = SequenceGrouper::new();
        let mut errors = Vec::new();
        let mut files = 0usize;

        for item in walk.by_ref() {
            if self.cancelled() {
                break;
            }
            match item {
                Ok(entry) => {
                    files += 1;
                    grouper.push(entry);
                }
                Err(e) => errors.push(e),
            }
        }
        let failed_roots = walk.failed_roots().to_vec();

        let entries = grouper.finish();
        info!(files, entries = entries.len(), "Grouped files into entries");

        let infos = if self.config.show_metadata {
            self.probe_all(&entries)?
        } else {
            vec![Some(EntryInfo::NotProbed); entries.len()]
        };

        let mut items = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for (entry, info) in entries.into_iter().zip(infos) {
            match info {
                Some(info) => items.push(ReportItem { entry, info }),
                None => skipped += 1,
            }
        }

        let interrupted = self.cancelled();
        if interrupted {
            info!(skipped, "Run interrupted");
        }

        let report = RunReport {
            items,
            errors,
            failed_roots,
            files,
            skipped,
            interrupted,
        };
        info!(
            entries = report.items.len(),
            failed = report.failed_entries(),
            unusable_paths = report.failed_roots.len(),
            "Run complete"
        );
        Ok(report)
    }

    /// Probe entries on a bounded pool
    ///
    /// Results land at the index of their entry, so the output order never
    /// depends on completion order. Entries not started before cancellation
    /// come back as `None`.
    fn probe_all(&self, entries: &[SequenceEntry]) -> Result<Vec<Option<EntryInfo>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("probe-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("Cannot start probe threads: {}", e)))?;

        let probe = &self.probe;
        let cancel = &self.cancel;
        let results = pool.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    let name = entry.file_name();
                    let _entry_span = span!(Level::DEBUG, "probe_entry", name = %name).entered();
                    Some(match probe.resolve(entry) {
                        Ok(metadata) => EntryInfo::Resolved(metadata),
                        Err(e) => {
                            debug!(error = %e, "Probe failed");
                            EntryInfo::Failed(e.to_string())
                        }
                    })
                })
                .collect()
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::probe::{BitDepth, Metadata, PixelFormat};
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Probe answering from the file name, failing for names containing "bad"
    struct NameProbe {
        calls: AtomicUsize,
    }

    impl NameProbe {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MetadataProbe for NameProbe {
        fn resolve(&self, entry: &SequenceEntry) -> std::result::Result<Metadata, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = entry.file_name();
            // Finish out of order to exercise result placement
            std::thread::sleep(Duration::from_millis((name.len() % 4) as u64 * 5));
            if name.contains("bad") {
                return Err(Error::UnsupportedFormat {
                    path: entry.first_path(),
                });
            }
            let mut metadata = Metadata::still(720, 480, PixelFormat::RGB, BitDepth::U8);
            if entry.numbered {
                metadata.apply_sequence(entry, Default::default());
            }
            Ok(metadata)
        }
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn config_for(dir: &Path) -> Config {
        Config {
            paths: vec![dir.to_path_buf()],
            columns: Some(0),
            threads: 4,
            ..Config::default()
        }
    }

    fn names(report: &RunReport) -> Vec<String> {
        report.items.iter().map(|i| i.entry.file_name()).collect()
    }

    #[test]
    fn test_probe_failure_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=3 {
            touch(dir.path(), &format!("shot.{:04}.exr", i));
        }
        touch(dir.path(), "bad.png");
        touch(dir.path(), "cover.png");

        let processor =
            Processor::with_probe(config_for(dir.path()), Arc::new(NameProbe::new())).unwrap();
        let report = processor.run().unwrap();

        assert_eq!(names(&report), vec!["bad.png", "cover.png", "shot.0001-0003.exr"]);
        assert_eq!(report.files, 5);
        assert_eq!(report.failed_entries(), 1);
        assert_eq!(report.exit_code(), 0);

        let lines = processor.formatter().render(&report.items);
        assert!(lines[0].starts_with("bad.png ERROR: "));
        assert_eq!(lines[1], "cover.png 720x480:1.5 RGB U8");
        assert_eq!(lines[2], "shot.0001-0003.exr 720x480:1.5 RGB U8@24");
    }

    #[test]
    fn test_output_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut expected = Vec::new();
        for name in ["q", "ab", "xyz", "m", "long_name", "b", "cc", "zz_top", "e"] {
            touch(dir.path(), &format!("{}.png", name));
            expected.push(format!("{}.png", name));
        }
        expected.sort();

        let processor =
            Processor::with_probe(config_for(dir.path()), Arc::new(NameProbe::new())).unwrap();
        for _ in 0..3 {
            assert_eq!(names(&processor.run().unwrap()), expected);
        }
    }

    #[test]
    fn test_names_only_skips_probing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.1.dpx");
        touch(dir.path(), "b.2.dpx");
        touch(dir.path(), "a.tga");

        let probe = Arc::new(NameProbe::new());
        let config = Config {
            show_metadata: false,
            ..config_for(dir.path())
        };
        let processor = Processor::with_probe(config, probe.clone()).unwrap();
        let report = processor.run().unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            processor.formatter().render(&report.items),
            vec!["a.tga", "b.1-2.dpx"]
        );
    }

    #[test]
    fn test_unusable_path_sets_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ok.png");

        let config = Config {
            paths: vec![dir.path().join("ok.png"), dir.path().join("missing")],
            ..config_for(dir.path())
        };
        let processor = Processor::with_probe(config, Arc::new(NameProbe::new())).unwrap();
        let report = processor.run().unwrap();

        assert_eq!(names(&report), vec!["ok.png"]);
        assert_eq!(report.failed_roots, vec![dir.path().join("missing")]);
        assert_eq!(report.exit_code(), 1);
        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].starts_with("Cannot read"));
    }

    #[test]
    fn test_one_diagnostic_per_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ok.png");

        let config = Config {
            paths: vec![
                dir.path().join("gone_a"),
                dir.path().join("ok.png"),
                dir.path().join("gone_b"),
            ],
            ..config_for(dir.path())
        };
        let processor = Processor::with_probe(config, Arc::new(NameProbe::new())).unwrap();
        let report = processor.run().unwrap();

        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].contains("gone_a"));
        assert!(diagnostics[1].contains("gone_b"));
        assert!(diagnostics.iter().all(|line| !line.contains('\n')));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_empty_directory_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let processor =
            Processor::with_probe(config_for(dir.path()), Arc::new(NameProbe::new())).unwrap();
        let report = processor.run().unwrap();
        assert!(report.items.is_empty());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_cancelled_run_starts_no_probes() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");

        let probe = Arc::new(NameProbe::new());
        let flag = Arc::new(AtomicBool::new(true));
        let processor = Processor::with_probe(config_for(dir.path()), probe.clone())
            .unwrap()
            .with_cancel_flag(flag);
        let report = processor.run().unwrap();

        assert!(report.interrupted);
        assert_eq!(report.exit_code(), 130);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            speed: -1.0,
            ..Config::default()
        };
        assert!(Processor::with_probe(config, Arc::new(NameProbe::new())).is_err());
    }

    #[test]
    fn test_media_probe_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        ImageBuffer::<Rgb<u8>, _>::new(720, 480)
            .save(dir.path().join("still.png"))
            .unwrap();
        for i in 1..=3 {
            ImageBuffer::<Rgb<u8>, _>::new(64, 32)
                .save(dir.path().join(format!("seq.{:03}.png", i)))
                .unwrap();
        }
        touch(dir.path(), "readme.txt");

        let config = Config {
            ffprobe: PathBuf::from("ffprobe-not-installed-here"),
            ..config_for(dir.path())
        };
        let processor = Processor::new(config).unwrap();
        let report = processor.run().unwrap();
        let lines = processor.formatter().render(&report.items);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("readme.txt ERROR: "));
        assert_eq!(lines[1], "seq.001-003.png 64x32:2 RGB U8@24");
        assert_eq!(lines[2], "still.png 720x480:1.5 RGB U8");
        assert_eq!(report.exit_code(), 0);
    }
}
