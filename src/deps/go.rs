//! Go support (modules)
//!
//! Go imports name packages, which are directories. Resolution therefore
//! picks a representative file of the package directory: `<last segment>.go`
//! when present, otherwise the first non-test source file.

use std::env;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use crate::deps::error::read_manifest;
use crate::deps::{
    DependencyInfo, Ecosystem, ImportInfo, ImportSpecifier, LanguageSupport, ManifestError,
    normalize_path,
};
use crate::io::FileSystemTrait;

#[derive(Debug, Clone)]
pub struct GoSupport {
    /// Module download cache (`$GOMODCACHE`, `$GOPATH/pkg/mod` or `~/go/pkg/mod`)
    module_cache: Option<PathBuf>,
    single_import: Regex,
    import_block: Regex,
    import_line: Regex,
}

impl GoSupport {
    pub fn new(module_cache: Option<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            module_cache,
            // import f "fmt"
            single_import: Regex::new(r#"(?m)^\s*import\s+([\w.]+\s+)?"([^"]+)""#)?,
            // import ( ... )
            import_block: Regex::new(r"(?s)\bimport\s*\(([^)]*)\)")?,
            import_line: Regex::new(r#"(?m)^\s*([\w.]+\s+)?"([^"]+)""#)?,
        })
    }

    pub fn from_env() -> Self {
        let module_cache = env::var_os("GOMODCACHE")
            .map(PathBuf::from)
            .or_else(|| env::var_os("GOPATH").map(|p| PathBuf::from(p).join("pkg").join("mod")))
            .or_else(|| {
                env::var_os("HOME").map(|h| PathBuf::from(h).join("go").join("pkg").join("mod"))
            });
        Self::new(module_cache).expect("Failed to compile Go import patterns")
    }

    /// Module path declared by `go.mod`
    fn module_path<F: FileSystemTrait>(&self, root: &Path, fs: &F) -> Option<String> {
        let content = fs.read_to_string(&root.join("go.mod")).ok()?;
        content.lines().find_map(|line| {
            line.trim()
                .strip_prefix("module")
                .map(|rest| rest.trim().trim_matches('"').to_string())
                .filter(|m| !m.is_empty())
        })
    }

    /// Module cache directory for a module version
    fn cache_dir(&self, module: &str, version: &str) -> Option<PathBuf> {
        let cache = self.module_cache.as_ref()?;
        Some(cache.join(format!("{}@{}", escape_module_path(module), version)))
    }

    fn parse_require(&self, manifest: &Path, entry: &str) -> Option<DependencyInfo> {
        let (spec, comment) = match entry.split_once("//") {
            Some((spec, comment)) => (spec.trim(), comment.trim()),
            None => (entry.trim(), ""),
        };
        let mut parts = spec.split_whitespace();
        let (Some(module), Some(version), None) = (parts.next(), parts.next(), parts.next()) else {
            warn!(
                "{}",
                ManifestError::invalid_entry(manifest, entry, "expected '<module> <version>'")
            );
            return None;
        };

        let mut dependency =
            DependencyInfo::new(module.trim_matches('"'), Ecosystem::Go).with_version(version);
        if comment == "indirect" {
            dependency.is_direct = false;
        }
        Some(dependency)
    }

    fn parse_go_mod(&self, manifest: &Path, content: &str) -> Vec<DependencyInfo> {
        let mut dependencies = Vec::new();
        let mut in_block = false;

        for line in content.lines() {
            let line = line.trim();
            if in_block {
                if line.starts_with(')') {
                    in_block = false;
                } else if !line.is_empty() && !line.starts_with("//") {
                    dependencies.extend(self.parse_require(manifest, line));
                }
                continue;
            }
            let Some(rest) = line.strip_prefix("require") else {
                continue;
            };
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
            } else if !rest.is_empty() {
                dependencies.extend(self.parse_require(manifest, rest));
            }
        }
        dependencies
    }
}

impl Default for GoSupport {
    fn default() -> Self {
        Self::new(None).expect("Failed to compile Go import patterns")
    }
}

/// Module cache escaping: uppercase letters become `!` + lowercase
fn escape_module_path(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Default package name of an import path, ignoring a `/vN` major version suffix
fn default_package_name(import_path: &str) -> &str {
    let mut segments = import_path.rsplit('/');
    let last = segments.next().unwrap_or(import_path);
    let is_major_version =
        last.len() > 1 && last.starts_with('v') && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}

fn to_import(alias: Option<&str>, path: &str) -> ImportInfo {
    let specifiers = match alias.map(str::trim) {
        // Blank import: side effects only
        Some("_") => Vec::new(),
        Some(alias) => vec![ImportSpecifier::namespace(alias)],
        None => vec![ImportSpecifier::namespace(default_package_name(path))],
    };
    ImportInfo::new(path, specifiers)
}

/// Representative file of a package directory
fn package_file<F: FileSystemTrait>(dir: &Path, fs: &F) -> Option<PathBuf> {
    if !fs.is_dir(dir) {
        return None;
    }
    let name = dir.file_name()?.to_string_lossy().into_owned();
    let preferred = dir.join(format!("{}.go", name));
    if fs.exists(&preferred) {
        return Some(preferred);
    }
    let mut files: Vec<PathBuf> = fs
        .read_dir(dir)
        .ok()?
        .into_iter()
        .filter(|p| is_go_source(p))
        .collect();
    files.sort();
    files.into_iter().next()
}

fn is_go_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
        && !path.to_string_lossy().ends_with("_test.go")
}

impl<F: FileSystemTrait> LanguageSupport<F> for GoSupport {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn manifest_files(&self) -> &'static [&'static str] {
        &["go.mod"]
    }

    fn parse_manifest(&self, root: &Path, fs: &F) -> Result<Vec<DependencyInfo>, ManifestError> {
        let manifest = root.join("go.mod");
        let Some(content) = read_manifest(fs, &manifest)? else {
            return Ok(Vec::new());
        };

        let mut dependencies = self.parse_go_mod(&manifest, &content);
        for dependency in &mut dependencies {
            let vendored = root.join("vendor").join(&dependency.name);
            if fs.is_dir(&vendored) {
                dependency.metadata.insert("vendored".to_string(), "true".to_string());
                dependency.location = Some(vendored);
                continue;
            }
            let cached = dependency
                .version
                .as_deref()
                .and_then(|version| self.cache_dir(&dependency.name, version));
            if let Some(cached) = cached.filter(|dir| fs.is_dir(dir)) {
                dependency.location = Some(cached);
            }
        }
        Ok(dependencies)
    }

    fn parse_imports(&self, source: &str) -> Vec<ImportInfo> {
        let mut found: Vec<(usize, ImportInfo)> = Vec::new();

        for captures in self.single_import.captures_iter(source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let alias = captures.get(1).map(|m| m.as_str());
            let path = captures.get(2).map_or("", |m| m.as_str());
            found.push((start, to_import(alias, path)));
        }

        for block in self.import_block.captures_iter(source) {
            let Some(body) = block.get(1) else {
                continue;
            };
            for captures in self.import_line.captures_iter(body.as_str()) {
                let start = body.start() + captures.get(0).map_or(0, |m| m.start());
                let alias = captures.get(1).map(|m| m.as_str());
                let path = captures.get(2).map_or("", |m| m.as_str());
                found.push((start, to_import(alias, path)));
            }
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, import)| import).collect()
    }

    fn is_relative(&self, specifier: &str) -> bool {
        specifier.starts_with("./") || specifier.starts_with("../")
    }

    fn package_name(&self, specifier: &str) -> String {
        specifier.to_string()
    }

    fn matches_dependency(&self, specifier: &str, dependency: &DependencyInfo) -> bool {
        specifier == dependency.name
            || specifier
                .strip_prefix(dependency.name.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn resolve_relative(&self, specifier: &str, importing_file: &Path, fs: &F) -> Option<PathBuf> {
        let dir = normalize_path(&importing_file.parent()?.join(specifier));
        package_file(&dir, fs)
    }

    fn resolve_in_dependency(
        &self,
        specifier: &str,
        dependency: &DependencyInfo,
        fs: &F,
    ) -> Option<PathBuf> {
        let location = dependency.location.as_ref()?;
        let subpath = specifier
            .strip_prefix(dependency.name.as_str())?
            .trim_start_matches('/');
        let dir = if subpath.is_empty() {
            location.clone()
        } else {
            location.join(subpath)
        };
        package_file(&dir, fs)
    }

    fn resolve_by_convention(&self, specifier: &str, root: &Path, fs: &F) -> Option<PathBuf> {
        // Packages of the project's own module
        if let Some(module) = self.module_path(root, fs)
            && let Some(rest) = specifier.strip_prefix(module.as_str())
            && (rest.is_empty() || rest.starts_with('/'))
        {
            return package_file(&root.join(rest.trim_start_matches('/')), fs);
        }
        package_file(&root.join("vendor").join(specifier), fs)
    }

    fn is_dependency_source(&self, path: &Path) -> bool {
        is_go_source(path)
    }
}
