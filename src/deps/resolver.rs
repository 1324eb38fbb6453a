//! Import specifier to file resolution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::deps::{DependencyInfo, Ecosystem, ImportInfo, LanguageSupport};
use crate::io::FileSystemTrait;
use crate::io::file_system::DEFAULT_IGNORED_DIRS;

/// Directories below the root that hold installed third-party code
const THIRD_PARTY_DIRS: &[&str] = &["vendor", "site-packages"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedModule {
    pub path: PathBuf,
    /// Dependency owning the file; `None` for project files
    pub dependency: Option<String>,
}

/// Read the manifests of every ecosystem detected at `root`
///
/// A manifest that cannot be read is logged and contributes nothing.
pub fn discover_dependencies<F: FileSystemTrait>(
    root: &Path,
    fs: &F,
    supports: &[Box<dyn LanguageSupport<F>>],
) -> Vec<DependencyInfo> {
    let mut dependencies = Vec::new();
    for support in supports {
        if !support.detect(root, fs) {
            continue;
        }
        match support.parse_manifest(root, fs) {
            Ok(found) => {
                debug!("Found {} {} dependencies", found.len(), support.ecosystem());
                dependencies.extend(found);
            }
            Err(e) => warn!("Skipping {} manifest: {}", support.ecosystem(), e),
        }
    }
    dependencies
}

/// Resolves import specifiers of project files
///
/// Lookup order: relative specifiers against the importing file, then the
/// installed location of a matching manifest dependency, then ecosystem
/// conventions (`node_modules`, virtualenvs, module caches, ...).
pub struct ModuleResolver<F: FileSystemTrait> {
    root: PathBuf,
    fs: F,
    supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
    dependencies: Vec<DependencyInfo>,
}

impl<F: FileSystemTrait> ModuleResolver<F> {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: F,
        supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
        dependencies: Vec<DependencyInfo>,
    ) -> Self {
        Self {
            root: root.into(),
            fs,
            supports,
            dependencies,
        }
    }

    /// Resolver over the dependencies declared by the project's manifests
    pub fn discover(
        root: impl Into<PathBuf>,
        fs: F,
        supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
    ) -> Self {
        let root = root.into();
        let dependencies = discover_dependencies(&root, &fs, &supports);
        Self::new(root, fs, supports, dependencies)
    }

    pub fn dependencies(&self) -> &[DependencyInfo] {
        &self.dependencies
    }

    pub fn support_for(&self, path: &Path) -> Option<&dyn LanguageSupport<F>> {
        let ecosystem = Ecosystem::for_path(path)?;
        self.supports
            .iter()
            .find(|s| s.ecosystem() == ecosystem)
            .map(|s| s.as_ref())
    }

    /// Parse the imports of a project file
    pub fn imports_of(&self, file: &Path) -> std::io::Result<Vec<ImportInfo>> {
        let Some(support) = self.support_for(file) else {
            return Ok(Vec::new());
        };
        let source = self.fs.read_to_string(file)?;
        Ok(support.parse_imports(&source))
    }

    /// Manifest dependency an external specifier belongs to
    pub fn dependency_for(&self, specifier: &str, ecosystem: Ecosystem) -> Option<&DependencyInfo> {
        let support = self.supports.iter().find(|s| s.ecosystem() == ecosystem)?;
        self.dependencies
            .iter()
            .filter(|d| d.ecosystem == ecosystem)
            .find(|d| support.matches_dependency(specifier, d))
    }

    pub fn resolve(&self, specifier: &str, importing_file: &Path) -> Option<ResolvedModule> {
        let support = self.support_for(importing_file)?;

        if support.is_relative(specifier) {
            let path = support.resolve_relative(specifier, importing_file, &self.fs)?;
            trace!("Resolved relative '{}' to {}", specifier, path.display());
            return Some(ResolvedModule {
                path,
                dependency: None,
            });
        }

        if let Some(dependency) = self.dependency_for(specifier, support.ecosystem())
            && let Some(path) = support.resolve_in_dependency(specifier, dependency, &self.fs)
        {
            trace!(
                "Resolved '{}' in dependency {} to {}",
                specifier,
                dependency.name,
                path.display()
            );
            return Some(ResolvedModule {
                path,
                dependency: Some(dependency.name.clone()),
            });
        }

        let path = support.resolve_by_convention(specifier, &self.root, &self.fs)?;
        let dependency =
            (!self.is_project_file(&path)).then(|| support.package_name(specifier));
        trace!("Resolved '{}' by convention to {}", specifier, path.display());
        Some(ResolvedModule { path, dependency })
    }

    /// Whether a path is a project source rather than installed third-party code
    fn is_project_file(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        !relative.components().any(|c| {
            let name = c.as_os_str();
            DEFAULT_IGNORED_DIRS.iter().any(|d| name == *d)
                || THIRD_PARTY_DIRS.iter().any(|d| name == *d)
        })
    }
}
