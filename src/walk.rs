//! Path discovery
//!
//! Turns the user's paths into a lazy stream of [`PathEntry`] values in
//! directory-listing order. Unreadable paths produce an error item and the
//! walk moves on.

use crate::error::{Error, Result};
use crate::sequence::{PathEntry, SequencePattern};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Enumerates files below a list of roots
#[derive(Debug, Clone)]
pub struct PathWalker {
    roots: Vec<PathBuf>,
    recurse: bool,
    extensions: Vec<String>,
}

impl PathWalker {
    /// An empty `roots` list walks the current directory
    pub fn new(roots: Vec<PathBuf>, recurse: bool) -> Self {
        let roots = if roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            roots
        };
        Self {
            roots,
            recurse,
            extensions: Vec::new(),
        }
    }

    /// Only list directory children with one of these extensions
    ///
    /// Files named explicitly are never filtered.
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether a directory child with extension `ext` (dot included) is listed
    pub fn accepts(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Start a new walk over all roots
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            walker: self,
            next_root: 0,
            current: None,
            pending: VecDeque::new(),
            failed_roots: Vec::new(),
        }
    }
}

/// A walk in progress; yields entries lazily
pub struct Walk<'a> {
    walker: &'a PathWalker,
    next_root: usize,
    current: Option<walkdir::IntoIter>,
    pending: VecDeque<PathEntry>,
    failed_roots: Vec<PathBuf>,
}

impl Walk<'_> {
    /// Roots that could not be used at all
    pub fn failed_roots(&self) -> &[PathBuf] {
        &self.failed_roots
    }

    fn open_root(&mut self, root: &Path) -> Result<()> {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {
                fs::read_dir(root).map_err(|e| Error::unreadable(root, e))?;
                let mut walk = WalkDir::new(root).min_depth(1).follow_links(true);
                if !self.walker.recurse {
                    walk = walk.max_depth(1);
                }
                debug!(root = %root.display(), recurse = self.walker.recurse, "Listing directory");
                self.current = Some(walk.into_iter());
                Ok(())
            }
            Ok(_) => {
                self.pending.push_back(PathEntry::from_path(root));
                Ok(())
            }
            Err(e) => match SequencePattern::parse(root) {
                Some(pattern) => {
                    let frames = expand_pattern(&pattern).map_err(|_| Error::unreadable(root, &e))?;
                    if frames.is_empty() {
                        return Err(Error::unreadable(root, e));
                    }
                    debug!(root = %root.display(), frames = frames.len(), "Expanded sequence argument");
                    self.pending.extend(frames);
                    Ok(())
                }
                None => Err(Error::unreadable(root, e)),
            },
        }
    }
}

/// Files of the pattern's directory that belong to the typed frame list
fn expand_pattern(pattern: &SequencePattern) -> Result<Vec<PathEntry>> {
    let listing_dir = if pattern.directory.as_os_str().is_empty() {
        Path::new(".")
    } else {
        pattern.directory.as_path()
    };

    let mut frames = Vec::new();
    for dir_entry in fs::read_dir(listing_dir)? {
        let dir_entry = dir_entry?;
        if dir_entry.file_type()?.is_dir() {
            continue;
        }
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let entry = PathEntry::new(pattern.directory.clone(), &name);
        if pattern.matches(&entry) {
            frames.push(entry);
        }
    }
    Ok(frames)
}

impl Iterator for Walk<'_> {
    type Item = Result<PathEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }

            if let Some(iter) = self.current.as_mut() {
                match iter.next() {
                    Some(Ok(dir_entry)) => {
                        if dir_entry.file_type().is_dir() {
                            continue;
                        }
                        let entry = PathEntry::from_path(dir_entry.path());
                        if !self.walker.accepts(&entry.extension) {
                            trace!(path = %dir_entry.path().display(), "Skipping filtered extension");
                            continue;
                        }
                        return Some(Ok(entry));
                    }
                    Some(Err(e)) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                        debug!(path = %path.display(), error = %e, "Cannot read directory entry");
                        return Some(Err(Error::unreadable(path, e)));
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            let walker = self.walker;
            let root = walker.roots.get(self.next_root)?;
            self.next_root += 1;
            if let Err(e) = self.open_root(root) {
                debug!(root = %root.display(), error = %e, "Cannot use path");
                self.failed_roots.push(root.clone());
                return Some(Err(e));
            }
        }
    }
}
