//! Top-level errors of the index engine

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;
use crate::index::cache::CacheError;

/// Errors surfaced by `ProjectIndex` operations
///
/// Per-file provider failures never appear here; they are collected into the
/// structured results of batch operations instead.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("No files matched the configured patterns under {root}")]
    NoFilesMatched { root: PathBuf },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid project root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

impl IndexError {
    pub fn no_files_matched<P: AsRef<Path>>(root: P) -> Self {
        Self::NoFilesMatched {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn invalid_root<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Wrap a failed `spawn_blocking` join
    pub(crate) fn join(error: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::other(error))
    }
}
