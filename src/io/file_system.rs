//! File system abstraction layer
//!
//! Provides trait-based abstractions for the file system operations the index
//! needs (reads, metadata, directory listing and glob expansion), enabling
//! dependency injection and testing through an in-memory implementation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::{MatchOptions, Pattern, PatternError};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Directories never descended into while expanding project patterns
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".symindex",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

// ============================================================================
// File Metadata
// ============================================================================

/// Simplified, testable alternative to std::fs::Metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// Last modification time
    pub modified: SystemTime,
    /// File size in bytes
    pub size: u64,
}

impl FileMetadata {
    pub fn new(modified: SystemTime, size: u64) -> Self {
        Self { modified, size }
    }

    pub fn from_std_metadata(metadata: &std::fs::Metadata) -> Result<Self, std::io::Error> {
        Ok(Self {
            modified: metadata.modified()?,
            size: metadata.len(),
        })
    }

    /// Modification time in milliseconds since the Unix epoch
    pub fn modified_millis(&self) -> u64 {
        self.modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// ============================================================================
// Glob patterns
// ============================================================================

/// Include/exclude glob patterns, matched against root-relative paths
#[derive(Debug, Clone, Default)]
pub struct FilePatterns {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl FilePatterns {
    pub fn new<I, S>(includes: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let includes = includes
            .into_iter()
            .map(|p| Pattern::new(p.as_ref().trim_start_matches("./")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            includes,
            excludes: Vec::new(),
        })
    }

    pub fn with_excludes<I, S>(mut self, excludes: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for exclude in excludes {
            self.excludes
                .push(Pattern::new(exclude.as_ref().trim_start_matches("./"))?);
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Check a root-relative path against the include and exclude lists
    pub fn matches(&self, relative: &Path) -> bool {
        self.includes
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }
}

/// Match a single glob against a path (absolute or relative)
pub fn glob_matches(pattern: &str, path: &Path) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches_path_with(path, MATCH_OPTIONS))
        .unwrap_or(false)
}

/// Check whether a string looks like a glob rather than a literal path
pub fn is_glob(value: &str) -> bool {
    value.contains(['*', '?', '['])
}

// ============================================================================
// File System Trait
// ============================================================================

/// Trait for file system operations
///
/// Enables dependency injection and testing through mock implementations.
pub trait FileSystemTrait: Clone + Send + Sync + 'static {
    /// Check if a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Read file contents as bytes
    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error>;

    /// Read file contents as UTF-8 text (lossy)
    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error> {
        self.read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Get file metadata (modification time, size)
    fn metadata(&self, path: &Path) -> Result<FileMetadata, std::io::Error>;

    /// List the direct entries of a directory
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, std::io::Error>;

    /// Expand glob patterns below `root`, returning sorted absolute file paths
    fn expand_patterns(&self, root: &Path, patterns: &FilePatterns) -> Vec<PathBuf>;
}

// ============================================================================
// Real File System Implementation
// ============================================================================

/// Real file system implementation using std::fs and walkdir
#[derive(Debug, Clone)]
pub struct RealFileSystem;

impl FileSystemTrait for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata, std::io::Error> {
        let metadata = std::fs::metadata(path)?;
        FileMetadata::from_std_metadata(&metadata)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn expand_patterns(&self, root: &Path, patterns: &FilePatterns) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !DEFAULT_IGNORED_DIRS
                    .iter()
                    .any(|ignored| entry.file_name() == *ignored)
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Log the error but continue scanning
                    warn!("Failed to access directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if patterns.matches(relative) {
                trace!("Pattern match: {}", relative.display());
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        files
    }
}

// ============================================================================
// Test File System Implementation
// ============================================================================


#[cfg(test)]
pub use test_filesystem::TestFileSystem;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_file_metadata_millis() {
        let time = UNIX_EPOCH + Duration::from_millis(1_500);
        let metadata = FileMetadata::new(time, 42);

        assert_eq!(metadata.modified_millis(), 1_500);
        assert_eq!(metadata.size, 42);
    }

    #[test]
    fn test_patterns_include_and_exclude() {
        let patterns = FilePatterns::new(["src/**/*.ts", "*.py"])
            .unwrap()
            .with_excludes(["**/*.test.ts"])
            .unwrap();

        assert!(patterns.matches(Path::new("src/a.ts")));
        assert!(patterns.matches(Path::new("src/deep/nested/b.ts")));
        assert!(patterns.matches(Path::new("main.py")));
        assert!(!patterns.matches(Path::new("pkg/main.py")));
        assert!(!patterns.matches(Path::new("src/a.test.ts")));
        assert!(!patterns.matches(Path::new("lib/a.ts")));
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("src/**/*.rs"));
        assert!(is_glob("file?.go"));
        assert!(!is_glob("/abs/path/main.go"));
    }

    #[test]
    fn test_test_filesystem_expand_patterns() {
        let fs = TestFileSystem::new();
        let time = UNIX_EPOCH + Duration::from_secs(1000);
        fs.set_file_content("/p/src/a.ts", "", time);
        fs.set_file_content("/p/src/b.js", "", time);
        fs.set_file_content("/p/src/util/c.ts", "", time);
        fs.set_file_content("/other/d.ts", "", time);

        let patterns = FilePatterns::new(["**/*.ts"]).unwrap();
        let files = fs.expand_patterns(Path::new("/p"), &patterns);

        assert_eq!(
            files,
            vec![PathBuf::from("/p/src/a.ts"), PathBuf::from("/p/src/util/c.ts")]
        );
        assert!(fs.is_dir(Path::new("/p/src")));
        assert_eq!(
            fs.read_dir(Path::new("/p/src")).unwrap(),
            vec![
                PathBuf::from("/p/src/a.ts"),
                PathBuf::from("/p/src/b.js"),
                PathBuf::from("/p/src/util")
            ]
        );
    }

    #[test]
    fn test_real_filesystem_expand_skips_ignored_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/index.ts"), "export const a = 1;").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.ts"), "").unwrap();

        let fs = RealFileSystem;
        let patterns = FilePatterns::new(["**/*.ts"]).unwrap();
        let files = fs.expand_patterns(root, &patterns);

        assert_eq!(files, vec![root.join("src/index.ts")]);
        assert_eq!(
            fs.read_to_string(&root.join("src/index.ts")).unwrap(),
            "export const a = 1;"
        );
    }

    #[test]
    fn test_real_filesystem_missing_path() {
        let fs = RealFileSystem;
        let non_existent = PathBuf::from("/definitely/does/not/exist");
        assert!(!fs.exists(&non_existent));
        assert!(fs.read(&non_existent).is_err());
        assert!(fs.metadata(&non_existent).is_err());
        assert!(fs.read_dir(&non_existent).is_err());
    }
}
