//! Persistent symbol cache
//!
//! The cache survives process restarts and lets incremental updates skip
//! files whose modification marker did not change. It is never the source of
//! truth: every read failure degrades to a miss.

pub mod filesystem;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::diff::ModificationMarker;
use crate::symbol::SymbolEntry;

pub use filesystem::FilesystemCacheStorage;

/// Bumped whenever the on-disk entry layout changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache entry corrupted: {path} - {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Cache format version {found} incompatible with expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },
}

impl CacheError {
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn corrupted<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Persisted symbols of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub version: u32,
    /// Absolute path of the indexed file
    pub path: PathBuf,
    pub marker: ModificationMarker,
    /// Set for dependency files; such entries are never diffed against the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_library: Option<String>,
    pub symbols: Vec<SymbolEntry>,
}

impl CacheEntry {
    pub fn new(path: impl Into<PathBuf>, marker: ModificationMarker, symbols: Vec<SymbolEntry>) -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            path: path.into(),
            marker,
            source_library: None,
            symbols,
        }
    }

    pub fn with_source_library(mut self, library: impl Into<String>) -> Self {
        self.source_library = Some(library.into());
        self
    }

    pub fn info(&self) -> CacheFileInfo {
        CacheFileInfo {
            path: self.path.clone(),
            marker: self.marker.clone(),
            source_library: self.source_library.clone(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.source_library.is_some()
    }
}

/// Entry header without the symbol payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFileInfo {
    pub path: PathBuf,
    pub marker: ModificationMarker,
    #[serde(default)]
    pub source_library: Option<String>,
}

/// Trait for persistent cache backends
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Marker of a cached file, without loading its symbols
    async fn get_file_info(&self, path: &Path) -> Result<Option<CacheFileInfo>, CacheError>;

    /// Full entry for a file; unreadable entries are misses
    async fn get(&self, path: &Path) -> Result<Option<CacheEntry>, CacheError>;

    /// Headers of every readable entry
    async fn get_all_files(&self) -> Result<Vec<CacheFileInfo>, CacheError>;

    /// Every readable entry
    async fn get_all_entries(&self) -> Result<Vec<CacheEntry>, CacheError>;

    /// Write an entry, replacing any previous one atomically
    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Returns true when an entry was removed
    async fn remove(&self, path: &Path) -> Result<bool, CacheError>;

    /// Delete every entry
    async fn clear(&self) -> Result<(), CacheError>;
}
