use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading dependency manifests
///
/// A failing entry is skipped with a warning by the parsers; these errors
/// surface only when a whole manifest cannot be read.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid entry '{entry}' in {path}: {reason}")]
    InvalidEntry {
        path: PathBuf,
        entry: String,
        reason: String,
    },
}

impl ManifestError {
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json<P: AsRef<Path>>(path: P, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn toml<P: AsRef<Path>>(path: P, source: toml::de::Error) -> Self {
        Self::Toml {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_entry<P: AsRef<Path>>(
        path: P,
        entry: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEntry {
            path: path.as_ref().to_path_buf(),
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

/// Read a manifest, mapping "not found" to `None`
pub(crate) fn read_manifest<F: crate::io::FileSystemTrait>(
    fs: &F,
    path: &Path,
) -> Result<Option<String>, ManifestError> {
    match fs.read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ManifestError::io(path, e)),
    }
}
