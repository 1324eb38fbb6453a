//! Configuration for a project index
//!
//! Provides `IndexConfig` with a builder, validation and environment
//! overrides. Loading and merging configuration files is left to callers;
//! they feed the result through the builder.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::index::diff::ChangeDetection;
use crate::io::FilePatterns;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default number of in-flight symbol provider requests
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound for provider concurrency; language servers serialize most work anyway
pub const MAX_CONCURRENCY: usize = 20;

/// Default concurrency for dependency indexing
pub const DEFAULT_DEPENDENCY_CONCURRENCY: usize = 3;

/// Hidden per-project directory holding the persistent cache
pub const DEFAULT_CACHE_DIR: &str = ".symindex";

/// Cap on files enumerated per dependency
pub const DEFAULT_MAX_FILES_PER_DEPENDENCY: usize = 200;

/// Patterns used when none are configured
pub const DEFAULT_PATTERNS: &[&str] = &[
    "**/*.ts",
    "**/*.tsx",
    "**/*.js",
    "**/*.jsx",
    "**/*.mts",
    "**/*.py",
    "**/*.go",
    "**/*.rs",
];

/// Patterns excluded when none are configured
pub const DEFAULT_EXCLUDES: &[&str] = &["**/*.d.ts", "**/*.min.js"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid concurrency {value}: must be between 1 and {max}")]
    InvalidConcurrency { value: usize, max: usize },

    #[error("No file patterns configured")]
    NoPatterns,

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid project root: {path}")]
    InvalidRoot { path: PathBuf },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Clamp a requested concurrency into the supported range
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY)
}

// ============================================================================
// Core Configuration Type
// ============================================================================

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Absolute project root
    pub root: PathBuf,

    /// Glob patterns (root-relative) selecting files to index
    pub patterns: Vec<String>,

    /// Glob patterns excluded from indexing
    pub exclude: Vec<String>,

    /// Maximum in-flight provider requests while indexing project files
    pub concurrency: usize,

    /// Maximum in-flight provider requests while indexing dependencies
    pub dependency_concurrency: usize,

    /// Name of the hidden cache directory under the root
    pub cache_dir_name: String,

    /// How file changes are detected between runs
    pub change_detection: ChangeDetection,

    /// Optional timeout applied to each provider request
    pub provider_timeout: Option<Duration>,

    /// Cap on files enumerated per dependency
    pub max_files_per_dependency: usize,
}

impl IndexConfig {
    /// Configuration with defaults for a root
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect(),
            concurrency: DEFAULT_CONCURRENCY,
            dependency_concurrency: DEFAULT_DEPENDENCY_CONCURRENCY,
            cache_dir_name: DEFAULT_CACHE_DIR.to_string(),
            change_detection: ChangeDetection::default(),
            provider_timeout: None,
            max_files_per_dependency: DEFAULT_MAX_FILES_PER_DEPENDENCY,
        }
    }

    /// Defaults for a root with the `SYMINDEX_*` overrides applied
    pub fn from_env(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::for_root(root).with_env_overrides()
    }

    /// Directory holding cache entries
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.cache_dir_name).join("cache")
    }

    /// Compile include/exclude patterns
    pub fn file_patterns(&self) -> Result<FilePatterns, ConfigError> {
        if self.patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        for pattern in self.patterns.iter().chain(&self.exclude) {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.msg.to_string(),
            })?;
        }
        FilePatterns::new(&self.patterns)
            .and_then(|p| p.with_excludes(&self.exclude))
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: self.patterns.join(","),
                reason: e.msg.to_string(),
            })
    }

    /// Apply `SYMINDEX_*` environment overrides
    ///
    /// - `SYMINDEX_PATTERNS`: comma separated include globs
    /// - `SYMINDEX_EXCLUDE`: comma separated exclude globs
    /// - `SYMINDEX_CONCURRENCY`: provider concurrency
    /// - `SYMINDEX_CACHE_DIR`: cache directory name
    /// - `SYMINDEX_CHANGE_DETECTION`: `mtime` or `hash`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let mut builder = IndexConfigBuilder::from_config(self);

        if let Ok(patterns) = env::var("SYMINDEX_PATTERNS") {
            builder = builder.patterns(split_list(&patterns));
        }
        if let Ok(excludes) = env::var("SYMINDEX_EXCLUDE") {
            builder = builder.exclude(split_list(&excludes));
        }
        if let Ok(value) = env::var("SYMINDEX_CONCURRENCY") {
            let concurrency = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "SYMINDEX_CONCURRENCY".to_string(),
                value: value.clone(),
            })?;
            builder = builder.concurrency(concurrency);
        }
        if let Ok(dir) = env::var("SYMINDEX_CACHE_DIR") {
            builder = builder.cache_dir_name(dir);
        }
        if let Ok(value) = env::var("SYMINDEX_CHANGE_DETECTION") {
            let detection = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SYMINDEX_CHANGE_DETECTION".to_string(),
                value: value.clone(),
            })?;
            builder = builder.change_detection(detection);
        }

        builder.build()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for IndexConfig with validation and defaults
#[derive(Debug)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            config: IndexConfig::for_root(root),
        }
    }

    pub fn from_config(config: IndexConfig) -> Self {
        Self { config }
    }

    /// Replace include patterns
    pub fn patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace exclude patterns
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn dependency_concurrency(mut self, concurrency: usize) -> Self {
        self.config.dependency_concurrency = concurrency;
        self
    }

    pub fn cache_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.cache_dir_name = name.into();
        self
    }

    pub fn change_detection(mut self, detection: ChangeDetection) -> Self {
        self.config.change_detection = detection;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = Some(timeout);
        self
    }

    pub fn max_files_per_dependency(mut self, max: usize) -> Self {
        self.config.max_files_per_dependency = max;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<IndexConfig, ConfigError> {
        let mut config = self.config;

        for value in [config.concurrency, config.dependency_concurrency] {
            if value == 0 || value > MAX_CONCURRENCY {
                return Err(ConfigError::InvalidConcurrency {
                    value,
                    max: MAX_CONCURRENCY,
                });
            }
        }

        if !config.root.is_absolute() {
            config.root = absolutize(&config.root).ok_or_else(|| ConfigError::InvalidRoot {
                path: config.root.clone(),
            })?;
        }

        if config.cache_dir_name.is_empty() || config.cache_dir_name.contains(['/', '\\']) {
            warn!(
                "Ignoring invalid cache directory name '{}'",
                config.cache_dir_name
            );
            config.cache_dir_name = DEFAULT_CACHE_DIR.to_string();
        }

        config.file_patterns()?;
        Ok(config)
    }
}

fn absolutize(path: &Path) -> Option<PathBuf> {
    env::current_dir().ok().map(|cwd| cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfigBuilder::new("/project").build().unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.cache_dir(), PathBuf::from("/project/.symindex/cache"));
        assert_eq!(config.change_detection, ChangeDetection::Mtime);
        assert!(config.patterns.iter().any(|p| p == "**/*.py"));
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let err = IndexConfigBuilder::new("/project")
            .concurrency(0)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidConcurrency {
                value: 0,
                max: MAX_CONCURRENCY
            }
        );
        assert!(
            IndexConfigBuilder::new("/project")
                .concurrency(21)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_empty_patterns_rejected() {
        let err = IndexConfigBuilder::new("/project")
            .patterns(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NoPatterns);
    }

    #[test]
    fn test_invalid_glob_reported() {
        let err = IndexConfigBuilder::new("/project")
            .patterns(["src/[*.ts"])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { pattern, .. } if pattern == "src/[*.ts"));
    }

    #[test]
    fn test_clamp_concurrency() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(7), 7);
        assert_eq!(clamp_concurrency(100), MAX_CONCURRENCY);
    }

    #[test]
    fn test_relative_root_is_absolutized() {
        let config = IndexConfigBuilder::new("relative/dir").build().unwrap();
        assert!(config.root.is_absolute());
        assert!(config.root.ends_with("relative/dir"));
    }
}
