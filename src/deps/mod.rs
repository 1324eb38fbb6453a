//! Third-party dependency discovery and import resolution
//!
//! Every supported ecosystem implements [`LanguageSupport`]: it reads the
//! project manifest, parses import statements of its source files and
//! knows where installed packages live on disk. [`ModuleResolver`] combines
//! them to map an import specifier to a file, and [`ExternalSymbolIndexer`]
//! feeds dependency files through the indexing pipeline.

pub mod error;
pub mod external;
pub mod go;
pub mod python;
pub mod resolver;
pub mod rust_lang;
pub mod typescript;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::io::{FilePatterns, FileSystemTrait};

pub use error::ManifestError;
pub use external::{ExternalIndexOptions, ExternalIndexResult, ExternalSymbolIndexer};
pub use go::GoSupport;
pub use python::PythonSupport;
pub use resolver::{ModuleResolver, ResolvedModule};
pub use rust_lang::RustSupport;
pub use typescript::TypeScriptSupport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// TypeScript and JavaScript (npm)
    TypeScript,
    Python,
    Go,
    Rust,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::TypeScript,
        Ecosystem::Python,
        Ecosystem::Go,
        Ecosystem::Rust,
    ];

    /// Ecosystem owning a source file, by extension
    pub fn for_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        match extension {
            "ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs" => Some(Self::TypeScript),
            "py" | "pyi" => Some(Self::Python),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
        };
        write!(f, "{}", name)
    }
}

/// A declared third-party dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    pub name: String,
    pub version: Option<String>,
    /// Installed location; `None` when the package is not installed
    pub location: Option<PathBuf>,
    pub is_direct: bool,
    pub ecosystem: Ecosystem,
    /// Free-form facts such as `dev`, `registry`, `git` or `path`
    pub metadata: BTreeMap<String, String>,
}

impl DependencyInfo {
    pub fn new(name: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version: None,
            location: None,
            is_direct: true,
            ecosystem,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.is_empty()).then_some(version);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_installed(&self) -> bool {
        self.location.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpecifier {
    /// Name exported by the source module
    pub imported: String,
    /// Name bound in the importing file
    pub local: String,
    pub is_default: bool,
    pub is_namespace: bool,
}

impl ImportSpecifier {
    pub fn named(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            imported: imported.into(),
            local: local.into(),
            is_default: false,
            is_namespace: false,
        }
    }

    pub fn default_import(local: impl Into<String>) -> Self {
        Self {
            imported: "default".to_string(),
            local: local.into(),
            is_default: true,
            is_namespace: false,
        }
    }

    pub fn namespace(local: impl Into<String>) -> Self {
        Self {
            imported: "*".to_string(),
            local: local.into(),
            is_default: false,
            is_namespace: true,
        }
    }
}

/// One import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportInfo {
    /// Module specifier as written
    pub source: String,
    pub specifiers: Vec<ImportSpecifier>,
    pub is_type_only: bool,
}

impl ImportInfo {
    pub fn new(source: impl Into<String>, specifiers: Vec<ImportSpecifier>) -> Self {
        Self {
            source: source.into(),
            specifiers,
            is_type_only: false,
        }
    }

    pub fn type_only(mut self, is_type_only: bool) -> Self {
        self.is_type_only = is_type_only;
        self
    }

    /// Specifier bound to `local` in the importing file
    pub fn specifier_for(&self, local: &str) -> Option<&ImportSpecifier> {
        self.specifiers.iter().find(|s| s.local == local)
    }
}

/// Ecosystem-specific manifest, import and layout knowledge
pub trait LanguageSupport<F: FileSystemTrait>: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Manifest file names looked up at the project root
    fn manifest_files(&self) -> &'static [&'static str];

    /// Whether the project at `root` uses this ecosystem
    fn detect(&self, root: &Path, fs: &F) -> bool {
        self.manifest_files()
            .iter()
            .any(|manifest| fs.exists(&root.join(manifest)))
    }

    /// Declared dependencies; a missing manifest yields an empty list
    fn parse_manifest(&self, root: &Path, fs: &F) -> Result<Vec<DependencyInfo>, ManifestError>;

    fn parse_imports(&self, source: &str) -> Vec<ImportInfo>;

    /// Whether a specifier points into the project rather than a package
    fn is_relative(&self, specifier: &str) -> bool;

    /// Dependency name an external specifier belongs to
    fn package_name(&self, specifier: &str) -> String;

    /// Whether `specifier` imports from `dependency`
    fn matches_dependency(&self, specifier: &str, dependency: &DependencyInfo) -> bool {
        self.package_name(specifier) == dependency.name
    }

    /// Resolve a project-relative specifier against the importing file
    fn resolve_relative(&self, specifier: &str, importing_file: &Path, fs: &F) -> Option<PathBuf>;

    /// Resolve a specifier inside an installed dependency
    fn resolve_in_dependency(
        &self,
        specifier: &str,
        dependency: &DependencyInfo,
        fs: &F,
    ) -> Option<PathBuf>;

    /// Resolve through well-known install locations when no manifest entry matched
    fn resolve_by_convention(&self, specifier: &str, root: &Path, fs: &F) -> Option<PathBuf>;

    /// Files of an installed dependency worth indexing
    fn is_dependency_source(&self, path: &Path) -> bool;

    /// Narrow the enumerated files of one dependency (e.g. prefer declarations)
    fn select_dependency_files(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        files
    }
}

/// Language support for every ecosystem, configured from the environment
pub fn all_language_support<F: FileSystemTrait>() -> Vec<Box<dyn LanguageSupport<F>>> {
    vec![
        Box::new(TypeScriptSupport::default()),
        Box::new(PythonSupport::from_env()),
        Box::new(GoSupport::from_env()),
        Box::new(RustSupport::from_env()),
    ]
}

/// Resolve `.` and `..` components lexically
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Try `base` as a file, with each extension appended, then as a directory
/// containing one of `index_files`
pub(crate) fn probe_module_path<F: FileSystemTrait>(
    fs: &F,
    base: &Path,
    extensions: &[&str],
    index_files: &[&str],
) -> Option<PathBuf> {
    if fs.exists(base) && !fs.is_dir(base) {
        return Some(base.to_path_buf());
    }

    let file_name = base.file_name()?.to_string_lossy().into_owned();
    for extension in extensions {
        let candidate = base.with_file_name(format!("{}.{}", file_name, extension));
        if fs.exists(&candidate) && !fs.is_dir(&candidate) {
            return Some(candidate);
        }
    }

    if fs.is_dir(base) {
        for index in index_files {
            let candidate = base.join(index);
            if fs.exists(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Collect the external module specifiers imported anywhere in the project
///
/// Relative imports are dropped. The result is keyed by ecosystem so callers
/// can map specifiers back to dependency names.
pub fn collect_project_imports<F: FileSystemTrait>(
    root: &Path,
    patterns: &FilePatterns,
    fs: &F,
    supports: &[Box<dyn LanguageSupport<F>>],
) -> BTreeMap<Ecosystem, BTreeSet<String>> {
    let mut imports: BTreeMap<Ecosystem, BTreeSet<String>> = BTreeMap::new();

    for path in fs.expand_patterns(root, patterns) {
        let Some(ecosystem) = Ecosystem::for_path(&path) else {
            continue;
        };
        let Some(support) = supports.iter().find(|s| s.ecosystem() == ecosystem) else {
            continue;
        };
        let source = match fs.read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                warn!("Cannot read {} for import scan: {}", path.display(), e);
                continue;
            }
        };
        for import in support.parse_imports(&source) {
            if !support.is_relative(&import.source) {
                imports
                    .entry(ecosystem)
                    .or_default()
                    .insert(import.source);
            }
        }
    }

    debug!(
        "Collected {} external import specifiers",
        imports.values().map(BTreeSet::len).sum::<usize>()
    );
    imports
}
