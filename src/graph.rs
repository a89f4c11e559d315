//! Map/generated-file resolution
//!
//! Entries from the whole scan are collected first; linking runs only once
//! every file has been classified, because a reference may point at a file
//! discovered earlier or later in the scan.
//!
//! Two independent passes fill each map's linked set:
//! - generated file -> map, via the `sourceMappingURL` directive
//! - map -> generated file, via the map's `file` field
//!
//! A map is uploaded only when exactly one generated file is linked to it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::checksum::Checksum;
use crate::classify::{Artifact, GeneratedFileEntry, SourceMapEntry};
use crate::log::{LogLevel, LogSink};

/// One map ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Path relative to the configured root, `/` separated
    pub relative_path: String,
    pub content: Vec<u8>,
    /// Hash of the linked generated file, not of the map
    pub hash: Checksum,
}

/// Result of resolving all maps of one call
#[derive(Debug, Default)]
pub struct Resolution {
    pub records: Vec<UploadRecord>,
    /// Maps without any generated file
    pub unmatched: Vec<PathBuf>,
    /// Maps with several candidate generated files
    pub ambiguous: Vec<PathBuf>,
}

/// Per-call state: scanned paths and every classified entry, keyed by URL
#[derive(Debug, Default)]
pub struct ResolutionContext {
    pub scanned: HashSet<PathBuf>,
    generated: BTreeMap<Url, GeneratedFileEntry>,
    maps: BTreeMap<Url, SourceMapEntry>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: Artifact) {
        match artifact {
            Artifact::Generated(file) => {
                self.generated.insert(file.url.clone(), file);
            }
            Artifact::SourceMap(map) => {
                self.maps.insert(map.url.clone(), map);
            }
        }
    }

    pub fn generated_files(&self) -> impl Iterator<Item = &GeneratedFileEntry> {
        self.generated.values()
    }

    pub fn source_maps(&self) -> impl Iterator<Item = &SourceMapEntry> {
        self.maps.values()
    }

    /// Generated files referencing a map through their directive
    fn link_from_generated(&mut self) {
        for file in self.generated.values() {
            let Some(map_ref) = &file.map_ref else { continue };
            if let Some(map) = self.maps.get_mut(map_ref) {
                map.linked.insert(file.url.clone());
            }
        }
    }

    /// Maps referencing a generated file through their `file` field
    fn link_from_maps(&mut self) {
        for map in self.maps.values_mut() {
            let Some(file_ref) = &map.file_ref else { continue };
            if self.generated.contains_key(file_ref) {
                map.linked.insert(file_ref.clone());
            }
        }
    }

    /// Run both linking passes
    pub fn link(&mut self) {
        self.link_from_generated();
        self.link_from_maps();
    }

    /// Link and turn every unambiguous map into an upload record.
    ///
    /// Unmatched and ambiguous maps are reported through `log` and skipped.
    pub fn resolve(mut self, root: &Path, log: &LogSink) -> Resolution {
        self.link();

        let mut resolution = Resolution::default();
        for map in self.maps.values() {
            let linked: Vec<&GeneratedFileEntry> = map
                .linked
                .iter()
                .filter_map(|url| self.generated.get(url))
                .collect();

            match linked.as_slice() {
                [] => {
                    log(
                        LogLevel::Verbose,
                        &format!("{}: no generated files found", map.path.display()),
                    );
                    resolution.unmatched.push(map.path.clone());
                }
                [file] => {
                    log(
                        LogLevel::Verbose,
                        &format!("{} -> {}", file.path.display(), map.path.display()),
                    );
                    resolution.records.push(UploadRecord {
                        relative_path: relative_path(root, &map.path),
                        content: map.content.clone(),
                        hash: file.hash.clone(),
                    });
                }
                files => {
                    let candidates = files
                        .iter()
                        .map(|f| f.path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    log(
                        LogLevel::Normal,
                        &format!(
                            "{}: multiple generated files found: {}",
                            map.path.display(),
                            candidates
                        ),
                    );
                    resolution.ambiguous.push(map.path.clone());
                }
            }
        }
        resolution
    }
}

/// `path` relative to `root`, climbing with `..` when it lies outside
pub fn relative_path(root: &Path, path: &Path) -> String {
    let root: Vec<Component> = root.components().collect();
    let target: Vec<Component> = path.components().collect();

    let common = root
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..root.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}
