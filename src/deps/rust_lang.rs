//! Rust support (Cargo)

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::deps::error::read_manifest;
use crate::deps::{
    DependencyInfo, Ecosystem, ImportInfo, ImportSpecifier, LanguageSupport, ManifestError,
    normalize_path,
};
use crate::io::FileSystemTrait;

const DEPENDENCY_SECTIONS: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

#[derive(Debug, Clone)]
pub struct RustSupport {
    cargo_home: Option<PathBuf>,
    use_stmt: Regex,
    extern_crate: Regex,
}

/// One leaf of an expanded `use` tree
#[derive(Debug, PartialEq)]
struct UseLeaf {
    path: Vec<String>,
    alias: Option<String>,
    glob: bool,
}

impl RustSupport {
    pub fn new(cargo_home: Option<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            cargo_home,
            use_stmt: Regex::new(r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?use[ \t]+([^;]+);")?,
            extern_crate: Regex::new(
                r"(?m)^[ \t]*extern[ \t]+crate[ \t]+(\w+)(?:[ \t]+as[ \t]+(\w+))?[ \t]*;",
            )?,
        })
    }

    pub fn from_env() -> Self {
        let cargo_home = env::var_os("CARGO_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".cargo")));
        Self::new(cargo_home).expect("Failed to compile Rust import patterns")
    }

    fn parse_dependency(
        &self,
        manifest: &Path,
        name: &str,
        value: &toml::Value,
        section: &str,
    ) -> Option<DependencyInfo> {
        let mut dependency = DependencyInfo::new(name, Ecosystem::Rust);
        match section {
            "dev-dependencies" => {
                dependency = dependency.with_metadata("dev", "true");
            }
            "build-dependencies" => {
                dependency = dependency.with_metadata("build", "true");
            }
            _ => {}
        }

        match value {
            toml::Value::String(version) => {
                dependency = dependency
                    .with_version(version.as_str())
                    .with_metadata("registry", "crates.io");
            }
            toml::Value::Table(table) => {
                if let Some(version) = table.get("version").and_then(|v| v.as_str()) {
                    dependency = dependency.with_version(version);
                }
                for key in ["path", "git", "branch", "tag", "rev", "package"] {
                    if let Some(v) = table.get(key).and_then(|v| v.as_str()) {
                        dependency = dependency.with_metadata(key, v);
                    }
                }
                if table.get("workspace").and_then(|v| v.as_bool()) == Some(true) {
                    dependency = dependency.with_metadata("workspace", "true");
                }
                if table.get("optional").and_then(|v| v.as_bool()) == Some(true) {
                    dependency = dependency.with_metadata("optional", "true");
                }
                if !table.contains_key("path") && !table.contains_key("git") {
                    let registry = table
                        .get("registry")
                        .and_then(|v| v.as_str())
                        .unwrap_or("crates.io");
                    dependency = dependency.with_metadata("registry", registry);
                }
            }
            other => {
                warn!(
                    "{}",
                    ManifestError::invalid_entry(
                        manifest,
                        format!("{} = {}", name, other),
                        "expected a version string or a table"
                    )
                );
                return None;
            }
        }
        Some(dependency)
    }

    /// Versions per crate name recorded in `Cargo.lock`
    fn locked_versions<F: FileSystemTrait>(
        &self,
        root: &Path,
        fs: &F,
    ) -> BTreeMap<String, Vec<String>> {
        let mut versions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let lock_path = root.join("Cargo.lock");
        let Ok(content) = fs.read_to_string(&lock_path) else {
            return versions;
        };
        let lock: toml::Table = match toml::from_str(&content) {
            Ok(lock) => lock,
            Err(e) => {
                warn!("{}", ManifestError::toml(&lock_path, e));
                return versions;
            }
        };

        let packages = lock.get("package").and_then(|p| p.as_array());
        for package in packages.into_iter().flatten() {
            let name = package.get("name").and_then(|v| v.as_str());
            let version = package.get("version").and_then(|v| v.as_str());
            if let (Some(name), Some(version)) = (name, version) {
                versions
                    .entry(name.to_string())
                    .or_default()
                    .push(version.to_string());
            }
        }
        versions
    }

    /// Extracted crate directories under `$CARGO_HOME/registry/src/<index>/`
    fn registry_crates<F: FileSystemTrait>(&self, crate_name: &str, fs: &F) -> Vec<PathBuf> {
        let Some(cargo_home) = &self.cargo_home else {
            return Vec::new();
        };
        let prefix = format!("{}-", crate_name);
        let mut found = Vec::new();
        for index in fs.read_dir(&cargo_home.join("registry").join("src")).unwrap_or_default() {
            for dir in fs.read_dir(&index).unwrap_or_default() {
                let is_match = dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix(&prefix))
                    .is_some_and(|version| version.starts_with(|c: char| c.is_ascii_digit()));
                if is_match {
                    found.push(dir);
                }
            }
        }
        found.sort();
        found
    }

    fn locate<F: FileSystemTrait>(
        &self,
        root: &Path,
        dependency: &DependencyInfo,
        locked: &BTreeMap<String, Vec<String>>,
        fs: &F,
    ) -> Option<PathBuf> {
        if let Some(path) = dependency.metadata.get("path") {
            let dir = normalize_path(&root.join(path));
            return fs.is_dir(&dir).then_some(dir);
        }
        if dependency.metadata.contains_key("git") {
            // Git checkouts are keyed by a URL hash; not located
            return None;
        }

        let crate_name = dependency
            .metadata
            .get("package")
            .map_or(dependency.name.as_str(), String::as_str);
        let requirement = dependency.version.as_deref().unwrap_or("");
        let exact = locked
            .get(crate_name)
            .and_then(|versions| pick_locked(versions, requirement));

        let candidates = self.registry_crates(crate_name, fs);
        let prefix = format!("{}-", crate_name);
        let version_of = |dir: &PathBuf| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .map(str::to_string)
        };

        if let Some(exact) = exact
            && let Some(dir) = candidates
                .iter()
                .find(|dir| version_of(dir).as_deref() == Some(exact))
        {
            return Some(dir.clone());
        }
        candidates
            .iter()
            .rev()
            .find(|dir| version_of(dir).is_some_and(|v| satisfies(&v, requirement)))
            .cloned()
    }

    fn parse_use_tree(&self, tree: &str) -> Vec<UseLeaf> {
        let mut leaves = Vec::new();
        expand_use_tree(&[], tree, &mut leaves);
        leaves
    }

    /// Crate root file of a crate directory
    fn lib_file<F: FileSystemTrait>(crate_dir: &Path, fs: &F) -> Option<PathBuf> {
        ["src/lib.rs", "src/main.rs"]
            .iter()
            .map(|f| crate_dir.join(f))
            .find(|p| fs.exists(p))
    }
}

impl Default for RustSupport {
    fn default() -> Self {
        Self::new(None).expect("Failed to compile Rust import patterns")
    }
}

fn strip_requirement(requirement: &str) -> &str {
    requirement
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches(['^', '~', '=', '>', '<'])
        .trim()
}

/// Loose semver check: `1.0` accepts `1.0.x`, `*` and empty accept anything
fn satisfies(version: &str, requirement: &str) -> bool {
    let requirement = strip_requirement(requirement);
    requirement.is_empty()
        || requirement == "*"
        || version == requirement
        || version.starts_with(&format!("{}.", requirement))
}

fn pick_locked<'a>(versions: &'a [String], requirement: &str) -> Option<&'a str> {
    match versions {
        [only] => Some(only.as_str()),
        _ => versions
            .iter()
            .find(|v| satisfies(v, requirement))
            .map(String::as_str),
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Split on commas outside nested braces
fn split_top_level(group: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in group.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&group[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&group[start..]);
    parts
}

fn expand_use_tree(prefix: &[String], tree: &str, leaves: &mut Vec<UseLeaf>) {
    let tree = tree.trim().trim_start_matches("::").trim();
    if tree.is_empty() {
        return;
    }

    if let Some(open) = tree.find('{') {
        let Some(close) = tree.rfind('}').filter(|close| *close > open) else {
            return;
        };
        let mut path = prefix.to_vec();
        path.extend(path_segments(&tree[..open]));
        for part in split_top_level(&tree[open + 1..close]) {
            expand_use_tree(&path, part, leaves);
        }
        return;
    }

    let (path_part, alias) = match tree.split_once(" as ") {
        Some((path, alias)) => (path, Some(alias.trim().to_string())),
        None => (tree, None),
    };
    let mut path = prefix.to_vec();
    path.extend(path_segments(path_part));

    if path.last().is_some_and(|s| s == "*") {
        path.pop();
        leaves.push(UseLeaf {
            path,
            alias: None,
            glob: true,
        });
    } else if !path.is_empty() {
        leaves.push(UseLeaf {
            path,
            alias,
            glob: false,
        });
    }
}

fn leaf_to_import(mut leaf: UseLeaf) -> Option<(String, ImportSpecifier)> {
    if leaf.glob {
        return Some((leaf.path.join("::"), ImportSpecifier::namespace("*")));
    }
    if leaf.path.last().is_some_and(|s| s == "self") {
        leaf.path.pop();
    } else if leaf.path.len() > 1 {
        let item = leaf.path.pop()?;
        let local = leaf.alias.unwrap_or_else(|| item.clone());
        return Some((leaf.path.join("::"), ImportSpecifier::named(item, local)));
    }
    // The module itself
    let local = leaf.alias.or_else(|| leaf.path.last().cloned())?;
    Some((leaf.path.join("::"), ImportSpecifier::namespace(local)))
}

/// Directory holding the child modules of the module defined in `file`
fn module_dir(file: &Path) -> Option<PathBuf> {
    let parent = file.parent()?;
    let stem = file.file_stem()?.to_str()?;
    match stem {
        "mod" | "lib" | "main" => Some(parent.to_path_buf()),
        _ => Some(parent.join(stem)),
    }
}

/// File defining the module whose children live in `dir`
fn module_file<F: FileSystemTrait>(dir: &Path, fs: &F) -> Option<PathBuf> {
    let mut candidates = vec![dir.join("mod.rs")];
    if dir.file_name().is_some() {
        candidates.push(dir.with_extension("rs"));
    }
    candidates.push(dir.join("lib.rs"));
    candidates.push(dir.join("main.rs"));
    candidates.into_iter().find(|p| fs.exists(p) && !fs.is_dir(p))
}

fn child_module<F: FileSystemTrait>(dir: &Path, name: &str, fs: &F) -> Option<PathBuf> {
    [dir.join(format!("{}.rs", name)), dir.join(name).join("mod.rs")]
        .into_iter()
        .find(|p| fs.exists(p) && !fs.is_dir(p))
}

/// Follow module segments from `file`; stops at the first segment that
/// names an item rather than a module
fn descend<F: FileSystemTrait>(mut file: PathBuf, segments: &[&str], fs: &F) -> Option<PathBuf> {
    for segment in segments {
        match *segment {
            "self" => {}
            "super" => {
                let dir = module_dir(&file)?;
                file = module_file(dir.parent()?, fs)?;
            }
            name => {
                let Some(child) = module_dir(&file).and_then(|dir| child_module(&dir, name, fs))
                else {
                    break;
                };
                file = child;
            }
        }
    }
    Some(file)
}

/// `src/lib.rs` (or `src/main.rs`) of the crate containing `file`
fn crate_root_file<F: FileSystemTrait>(file: &Path, fs: &F) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .filter(|dir| fs.exists(&dir.join("Cargo.toml")))
        .find_map(|dir| RustSupport::lib_file(dir, fs))
}

impl<F: FileSystemTrait> LanguageSupport<F> for RustSupport {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn manifest_files(&self) -> &'static [&'static str] {
        &["Cargo.toml"]
    }

    fn parse_manifest(&self, root: &Path, fs: &F) -> Result<Vec<DependencyInfo>, ManifestError> {
        let manifest = root.join("Cargo.toml");
        let Some(content) = read_manifest(fs, &manifest)? else {
            return Ok(Vec::new());
        };
        let document: toml::Table =
            toml::from_str(&content).map_err(|e| ManifestError::toml(&manifest, e))?;

        let mut dependencies = Vec::new();
        for section in DEPENDENCY_SECTIONS {
            let Some(table) = document.get(section).and_then(|v| v.as_table()) else {
                continue;
            };
            for (name, value) in table {
                dependencies.extend(self.parse_dependency(&manifest, name, value, section));
            }
        }

        let locked = self.locked_versions(root, fs);
        for dependency in &mut dependencies {
            dependency.location = self.locate(root, dependency, &locked, fs);
            if dependency.version.is_none()
                && let Some(versions) = locked.get(&dependency.name)
                && let Some(version) = pick_locked(versions, "")
            {
                dependency.version = Some(version.to_string());
            }
        }
        debug!("Parsed {} Cargo dependencies", dependencies.len());
        Ok(dependencies)
    }

    fn parse_imports(&self, source: &str) -> Vec<ImportInfo> {
        let mut found: Vec<(usize, ImportInfo)> = Vec::new();

        for captures in self.use_stmt.captures_iter(source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let tree = captures.get(1).map_or("", |m| m.as_str());

            // Merge leaves sharing a module path
            let mut grouped: Vec<ImportInfo> = Vec::new();
            for (module, specifier) in self
                .parse_use_tree(tree)
                .into_iter()
                .filter_map(leaf_to_import)
            {
                match grouped.iter_mut().find(|i| i.source == module) {
                    Some(import) => import.specifiers.push(specifier),
                    None => grouped.push(ImportInfo::new(module, vec![specifier])),
                }
            }
            found.extend(grouped.into_iter().map(|import| (start, import)));
        }

        for captures in self.extern_crate.captures_iter(source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let name = captures.get(1).map_or("", |m| m.as_str());
            let local = captures.get(2).map_or(name, |m| m.as_str());
            found.push((
                start,
                ImportInfo::new(name, vec![ImportSpecifier::namespace(local)]),
            ));
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, import)| import).collect()
    }

    fn is_relative(&self, specifier: &str) -> bool {
        matches!(
            specifier.split("::").next(),
            Some("crate" | "self" | "super")
        )
    }

    fn package_name(&self, specifier: &str) -> String {
        specifier
            .trim_start_matches("::")
            .split("::")
            .next()
            .unwrap_or(specifier)
            .to_string()
    }

    fn matches_dependency(&self, specifier: &str, dependency: &DependencyInfo) -> bool {
        LanguageSupport::<F>::package_name(self, specifier) == dependency.name.replace('-', "_")
    }

    fn resolve_relative(&self, specifier: &str, importing_file: &Path, fs: &F) -> Option<PathBuf> {
        let segments: Vec<&str> = specifier.split("::").filter(|s| !s.is_empty()).collect();
        let (first, rest) = segments.split_first()?;
        match *first {
            "crate" => descend(crate_root_file(importing_file, fs)?, rest, fs),
            "self" | "super" => descend(importing_file.to_path_buf(), &segments, fs),
            _ => None,
        }
    }

    fn resolve_in_dependency(
        &self,
        specifier: &str,
        dependency: &DependencyInfo,
        fs: &F,
    ) -> Option<PathBuf> {
        let lib = Self::lib_file(dependency.location.as_ref()?, fs)?;
        let segments: Vec<&str> = specifier.split("::").filter(|s| !s.is_empty()).collect();
        descend(lib, segments.get(1..).unwrap_or(&[]), fs)
    }

    fn resolve_by_convention(&self, specifier: &str, root: &Path, fs: &F) -> Option<PathBuf> {
        let segments: Vec<&str> = specifier.split("::").filter(|s| !s.is_empty()).collect();
        let (first, rest) = segments.split_first()?;

        // A module at the crate root (2018 paths without `crate::`)
        if let Some(module) = child_module(&root.join("src"), first, fs) {
            return descend(module, rest, fs);
        }

        let crate_dir = self
            .registry_crates(first, fs)
            .pop()
            .or_else(|| self.registry_crates(&first.replace('_', "-"), fs).pop())?;
        descend(Self::lib_file(&crate_dir, fs)?, rest, fs)
    }

    fn is_dependency_source(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "rs")
    }

    fn select_dependency_files(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let in_src: Vec<PathBuf> = files
            .iter()
            .filter(|p| p.components().any(|c| c.as_os_str() == "src"))
            .cloned()
            .collect();
        if in_src.is_empty() { files } else { in_src }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_system::TestFileSystem;
    use std::time::SystemTime;

    const CARGO_TOML: &str = r#"
[package]
name = "app"
version = "0.1.0"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
tokio-util = "0.7"
local-utils = { path = "../utils" }
forked = { git = "https://example.com/forked.git", branch = "main" }
weird = 3

[dev-dependencies]
tempfile = "3"

[build-dependencies]
cc = "1.0"
"#;

    const CARGO_LOCK: &str = r#"
[[package]]
name = "serde"
version = "1.0.195"

[[package]]
name = "tokio-util"
version = "0.7.10"
"#;

    fn registry_fs() -> TestFileSystem {
        let fs = TestFileSystem::new();
        let now = SystemTime::now();
        fs.set_file_content("/ws/app/Cargo.toml", CARGO_TOML, now);
        fs.set_file_content("/ws/app/Cargo.lock", CARGO_LOCK, now);
        fs.set_file_content("/ws/utils/src/lib.rs", "", now);
        let index = "/cargo/registry/src/index.crates.io-6f17d22bba15001f";
        fs.set_file_content(format!("{index}/serde-1.0.180/src/lib.rs"), "", now);
        fs.set_file_content(format!("{index}/serde-1.0.195/src/lib.rs"), "", now);
        fs.set_file_content(format!("{index}/serde-1.0.195/src/de/mod.rs"), "", now);
        fs.set_file_content(format!("{index}/serde_json-1.0.111/src/lib.rs"), "", now);
        fs.set_file_content(format!("{index}/tempfile-3.9.0/src/lib.rs"), "", now);
        fs
    }

    #[test]
    fn test_parse_cargo_manifest() {
        let fs = registry_fs();
        let support = RustSupport::new(Some(PathBuf::from("/cargo"))).unwrap();
        let deps = support.parse_manifest(Path::new("/ws/app"), &fs).unwrap();

        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["forked", "local-utils", "serde", "tokio-util", "tempfile", "cc"]
        );

        let by_name = |name: &str| deps.iter().find(|d| d.name == name).unwrap();
        assert_eq!(
            by_name("serde").location,
            Some(PathBuf::from(
                "/cargo/registry/src/index.crates.io-6f17d22bba15001f/serde-1.0.195"
            ))
        );
        assert_eq!(by_name("serde").metadata["registry"], "crates.io");
        assert_eq!(
            by_name("local-utils").location,
            Some(PathBuf::from("/ws/utils"))
        );
        assert_eq!(by_name("forked").metadata["git"], "https://example.com/forked.git");
        assert!(!by_name("forked").is_installed());
        assert!(!by_name("tokio-util").is_installed());
        assert_eq!(by_name("tempfile").metadata["dev"], "true");
        assert!(by_name("tempfile").is_installed());
        assert_eq!(by_name("cc").metadata["build"], "true");
    }

    #[test]
    fn test_parse_use_statements() {
        let source = "use std::collections::{HashMap, btree_map::{self, Entry as E}};\n\
            pub(crate) use crate::index::store::*;\n\
            use serde;\n\
            use tokio::sync::Mutex as AsyncMutex;\n\
            extern crate alloc as heap;\n\
            // use commented::Out;\n";
        let parsed =
            LanguageSupport::<TestFileSystem>::parse_imports(&RustSupport::default(), source);

        let sources: Vec<&str> = parsed.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(
            sources,
            vec![
                "std::collections",
                "std::collections::btree_map",
                "crate::index::store",
                "serde",
                "tokio::sync",
                "alloc"
            ]
        );
        assert_eq!(
            parsed[0].specifiers,
            vec![ImportSpecifier::named("HashMap", "HashMap")]
        );
        assert_eq!(
            parsed[1].specifiers,
            vec![
                ImportSpecifier::namespace("btree_map"),
                ImportSpecifier::named("Entry", "E")
            ]
        );
        assert_eq!(parsed[2].specifiers, vec![ImportSpecifier::namespace("*")]);
        assert_eq!(parsed[3].specifiers, vec![ImportSpecifier::namespace("serde")]);
        assert_eq!(
            parsed[4].specifiers,
            vec![ImportSpecifier::named("Mutex", "AsyncMutex")]
        );
        assert_eq!(parsed[5].specifiers, vec![ImportSpecifier::namespace("heap")]);
    }

    #[test]
    fn test_resolve_relative_paths() {
        let fs = TestFileSystem::new();
        let now = SystemTime::now();
        fs.set_file_content("/p/Cargo.toml", "[package]\nname = \"p\"\n", now);
        fs.set_file_content("/p/src/lib.rs", "", now);
        fs.set_file_content("/p/src/index/mod.rs", "", now);
        fs.set_file_content("/p/src/index/store.rs", "", now);
        fs.set_file_content("/p/src/index/cache/mod.rs", "", now);
        fs.set_file_content("/p/src/index/cache/filesystem.rs", "", now);
        let support = RustSupport::default();

        assert_eq!(
            support.resolve_relative(
                "crate::index::store::SymbolStore",
                Path::new("/p/src/index/cache/filesystem.rs"),
                &fs
            ),
            Some(PathBuf::from("/p/src/index/store.rs"))
        );
        assert_eq!(
            support.resolve_relative(
                "super::CacheEntry",
                Path::new("/p/src/index/cache/filesystem.rs"),
                &fs
            ),
            Some(PathBuf::from("/p/src/index/cache/mod.rs"))
        );
        assert_eq!(
            support.resolve_relative("self::store", Path::new("/p/src/index/mod.rs"), &fs),
            Some(PathBuf::from("/p/src/index/store.rs"))
        );
    }

    #[test]
    fn test_resolve_in_dependency_and_registry() {
        let fs = registry_fs();
        let support = RustSupport::new(Some(PathBuf::from("/cargo"))).unwrap();
        let index = PathBuf::from("/cargo/registry/src/index.crates.io-6f17d22bba15001f");

        let mut serde = DependencyInfo::new("serde", Ecosystem::Rust);
        serde.location = Some(index.join("serde-1.0.195"));
        assert_eq!(
            support.resolve_in_dependency("serde::de::Deserialize", &serde, &fs),
            Some(index.join("serde-1.0.195/src/de/mod.rs"))
        );
        assert!(LanguageSupport::<TestFileSystem>::matches_dependency(
            &support,
            "serde::Serialize",
            &serde
        ));

        let tokio_util = DependencyInfo::new("tokio-util", Ecosystem::Rust);
        assert!(LanguageSupport::<TestFileSystem>::matches_dependency(
            &support,
            "tokio_util::sync::CancellationToken",
            &tokio_util
        ));

        assert_eq!(
            support.resolve_by_convention("serde_json::Value", Path::new("/ws/app"), &fs),
            Some(index.join("serde_json-1.0.111/src/lib.rs"))
        );
    }

    #[test]
    fn test_satisfies_requirement() {
        assert!(satisfies("1.0.195", "1.0"));
        assert!(satisfies("1.0.195", "^1"));
        assert!(satisfies("0.7.10", "=0.7.10"));
        assert!(!satisfies("0.8.0", "0.7"));
        assert!(satisfies("2.0.0", ""));
    }
}
