//! Incremental change detection
//!
//! Compares the current file listing against the markers stored in the
//! persistent cache and decides which files must be re-fetched and which
//! cache entries are orphaned. One detection strategy is used per run; there
//! is no version-control based detection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::io::FileSystemTrait;

/// How a file's modification marker is computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDetection {
    /// Modification time in milliseconds
    #[default]
    Mtime,
    /// SHA-256 of the file content
    ContentHash,
}

impl FromStr for ChangeDetection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mtime" | "timestamp" => Ok(Self::Mtime),
            "hash" | "content" | "contenthash" | "content-hash" => Ok(Self::ContentHash),
            other => Err(format!(
                "Unknown change detection '{}': expected 'mtime' or 'hash'",
                other
            )),
        }
    }
}

/// Value used to detect whether a file changed since it was indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ModificationMarker {
    /// Milliseconds since the Unix epoch
    Timestamp(u64),
    /// Hex encoded SHA-256 of the content
    ContentHash(String),
}

impl fmt::Display for ModificationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(millis) => write!(f, "mtime:{}", millis),
            Self::ContentHash(hash) => write!(f, "sha256:{}", hash),
        }
    }
}

/// Compute SHA-256 hex digest of content
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Compute the current marker of a file with the given strategy
pub fn current_marker<F: FileSystemTrait>(
    fs: &F,
    path: &Path,
    detection: ChangeDetection,
) -> Result<ModificationMarker, std::io::Error> {
    match detection {
        ChangeDetection::Mtime => Ok(ModificationMarker::Timestamp(
            fs.metadata(path)?.modified_millis(),
        )),
        ChangeDetection::ContentHash => Ok(ModificationMarker::ContentHash(content_hash(
            &fs.read(path)?,
        ))),
    }
}

/// Files to re-fetch and cache entries to drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_update: Vec<PathBuf>,
    pub to_remove: Vec<PathBuf>,
    /// Number of files found unchanged
    pub unchanged: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Force `paths` into the update set; paths counted unchanged move over
    pub fn include_updates(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut queued: HashSet<PathBuf> = self.to_update.iter().cloned().collect();
        for path in paths {
            if queued.insert(path.clone()) {
                self.to_update.push(path);
                self.unchanged = self.unchanged.saturating_sub(1);
            }
        }
        self.to_update.sort();
    }
}

/// Change detector over a file system
#[derive(Debug, Clone)]
pub struct IncrementalDiff<F: FileSystemTrait> {
    fs: F,
    detection: ChangeDetection,
}

impl<F: FileSystemTrait> IncrementalDiff<F> {
    pub fn new(fs: F, detection: ChangeDetection) -> Self {
        Self { fs, detection }
    }

    pub fn detection(&self) -> ChangeDetection {
        self.detection
    }

    /// Compute the change set
    ///
    /// `cached` is `None` when no cache exists at all, which yields a full
    /// index: every current file is updated and nothing is removed.
    pub fn compute(
        &self,
        current_files: &[PathBuf],
        cached: Option<&HashMap<PathBuf, ModificationMarker>>,
    ) -> ChangeSet {
        let Some(cached) = cached else {
            debug!(
                "No cache available, scheduling full index of {} files",
                current_files.len()
            );
            return ChangeSet {
                to_update: current_files.to_vec(),
                to_remove: Vec::new(),
                unchanged: 0,
            };
        };

        let mut change_set = ChangeSet::default();

        for path in current_files {
            let Some(previous) = cached.get(path) else {
                trace!("New file: {}", path.display());
                change_set.to_update.push(path.clone());
                continue;
            };

            match current_marker(&self.fs, path, self.detection) {
                Ok(current) if &current == previous => change_set.unchanged += 1,
                Ok(current) => {
                    trace!(
                        "Changed file: {} ({} -> {})",
                        path.display(),
                        previous,
                        current
                    );
                    change_set.to_update.push(path.clone());
                }
                Err(e) => {
                    // Let the pipeline surface the real error
                    debug!("Cannot read marker for {}: {}", path.display(), e);
                    change_set.to_update.push(path.clone());
                }
            }
        }

        let current: HashSet<&PathBuf> = current_files.iter().collect();
        change_set.to_remove = cached
            .keys()
            .filter(|path| !current.contains(path))
            .cloned()
            .collect();
        change_set.to_remove.sort();

        debug!(
            "Change set: {} to update, {} to remove, {} unchanged",
            change_set.to_update.len(),
            change_set.to_remove.len(),
            change_set.unchanged
        );
        change_set
    }
}
