//! File discovery
//!
//! Walks the configured roots and yields the absolute paths of every file that
//! should be classified. Explicitly named files bypass the extension filter;
//! directories are walked recursively with extension and ignore filtering.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::error::{Result, UploadError};
use crate::log::{LogLevel, LogSink};

/// Enumerates candidate files under a set of roots
#[derive(Debug, Clone)]
pub struct FileScanner {
    extensions: Vec<String>,
    ignore: GlobSet,
}

impl FileScanner {
    pub fn new(extensions: &[String], ignore: &[String]) -> Result<Self> {
        Ok(Self {
            extensions: extensions.to_vec(),
            ignore: compile_globset(ignore)?,
        })
    }

    /// Scan every root in order, skipping paths already present in `seen`.
    ///
    /// Newly discovered paths are added to `seen`, so a file reachable from
    /// two roots is returned once.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        seen: &mut HashSet<PathBuf>,
        log: &LogSink,
    ) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for root in roots {
            // Canonical roots make paths reached through `..` or symlinks dedupe.
            let root = match fs::canonicalize(root) {
                Ok(root) => root,
                Err(_) => {
                    log(
                        LogLevel::Verbose,
                        &format!("{} does not exist, skipping", root.display()),
                    );
                    continue;
                }
            };

            for path in self.scan_root(&root) {
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        files
    }

    /// Files under a single canonical root, unfiltered if the root is a file
    fn scan_root(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return vec![root.to_path_buf()];
        }
        if !root.is_dir() {
            return Vec::new();
        }

        let ignore = self.ignore.clone();
        let base = root.to_path_buf();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_ignored(&ignore, &base, entry.path()))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if self.has_allowed_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// Ignore globs match the path below the walked root
fn is_ignored(ignore: &GlobSet, root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(relative) => !relative.as_os_str().is_empty() && ignore.is_match(relative),
        Err(_) => false,
    }
}

fn compile_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for g in globs {
        let glob = Glob::new(g).map_err(|source| UploadError::InvalidIgnorePattern {
            pattern: g.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| UploadError::InvalidIgnorePattern {
        pattern: globs.join(", "),
        source,
    })
}
