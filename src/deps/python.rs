//! Python support (pip / Poetry packages in a virtualenv)

use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::deps::error::read_manifest;
use crate::deps::{
    DependencyInfo, Ecosystem, ImportInfo, ImportSpecifier, LanguageSupport, ManifestError,
    probe_module_path,
};
use crate::io::FileSystemTrait;

const EXTENSIONS: &[&str] = &["pyi", "py"];
const INDEX_FILES: &[&str] = &["__init__.pyi", "__init__.py"];
const VENV_DIRS: &[&str] = &[".venv", "venv", "env"];

/// PEP 503 normalization, with `_` as separator to match import names
pub fn normalize_package_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['-', '.'], "_")
}

/// Parsed PEP 508 requirement (the subset found in real projects)
#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement {
    name: String,
    extras: Option<String>,
    operator: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PythonSupport {
    /// Active virtualenv (`VIRTUAL_ENV`) checked after the project-local ones
    virtual_env: Option<PathBuf>,
    requirement: Regex,
    import_stmt: Regex,
    from_stmt: Regex,
}

impl PythonSupport {
    pub fn new(virtual_env: Option<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            virtual_env,
            // requests[socks]>=2.31 ; python_version > "3.8"
            requirement: Regex::new(
                r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[[^\]]*\])?\s*(===|==|~=|>=|<=|!=|>|<)?\s*([^;,\s]*)",
            )?,
            // import a.b as c, d
            import_stmt: Regex::new(r"(?m)^[ \t]*import[ \t]+([^\n#;]+)")?,
            // from .m import x as y / from m import (x, y)
            from_stmt: Regex::new(
                r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+(\([^)]*\)|[^\n#;]+)",
            )?,
        })
    }

    pub fn from_env() -> Self {
        let mut support = Self::default();
        support.virtual_env = env::var_os("VIRTUAL_ENV").map(PathBuf::from);
        support
    }

    fn parse_requirement(&self, line: &str) -> Option<Requirement> {
        let captures = self.requirement.captures(line.trim())?;
        let text = |i: usize| {
            captures
                .get(i)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };
        Some(Requirement {
            name: text(1)?,
            extras: text(2),
            operator: text(3),
            version: text(4),
        })
    }

    fn to_dependency(&self, requirement: Requirement) -> DependencyInfo {
        let mut dependency = DependencyInfo::new(&requirement.name, Ecosystem::Python);
        if let Some(extras) = requirement.extras {
            dependency = dependency.with_metadata("extras", extras.trim_matches(['[', ']']));
        }
        match (requirement.operator.as_deref(), requirement.version) {
            (Some("==") | Some("==="), Some(version)) => dependency.with_version(version),
            (Some(operator), Some(version)) => {
                dependency.with_metadata("requested", format!("{}{}", operator, version))
            }
            _ => dependency,
        }
    }

    fn parse_requirements_txt(&self, path: &Path, content: &str) -> Vec<DependencyInfo> {
        let mut dependencies = Vec::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            // Options (-r, -e, --index-url), paths and URLs are not package names
            if line.is_empty()
                || line.starts_with('-')
                || line.starts_with('.')
                || line.starts_with('/')
                || line.contains("://")
            {
                continue;
            }
            match self.parse_requirement(line) {
                Some(requirement) => dependencies.push(self.to_dependency(requirement)),
                None => warn!(
                    "{}",
                    ManifestError::invalid_entry(path, line, "not a PEP 508 requirement")
                ),
            }
        }
        dependencies
    }

    fn parse_pyproject(
        &self,
        path: &Path,
        content: &str,
    ) -> Result<Vec<DependencyInfo>, ManifestError> {
        let document: toml::Value =
            toml::from_str(content).map_err(|e| ManifestError::toml(path, e))?;
        let mut dependencies = Vec::new();

        let project = document.get("project");
        let mut pep621 = |list: Option<&toml::Value>, flag: Option<(&str, &str)>| {
            for entry in list.and_then(toml::Value::as_array).into_iter().flatten() {
                let parsed = entry.as_str().and_then(|s| self.parse_requirement(s));
                match parsed {
                    Some(requirement) => {
                        let mut dependency = self.to_dependency(requirement);
                        if let Some((key, value)) = flag {
                            dependency = dependency.with_metadata(key, value);
                        }
                        dependencies.push(dependency);
                    }
                    None => warn!(
                        "{}",
                        ManifestError::invalid_entry(path, entry.to_string(), "not a requirement string")
                    ),
                }
            }
        };

        pep621(project.and_then(|p| p.get("dependencies")), None);
        if let Some(groups) = project
            .and_then(|p| p.get("optional-dependencies"))
            .and_then(toml::Value::as_table)
        {
            for (group, list) in groups {
                pep621(Some(list), Some(("optional", group.as_str())));
            }
        }

        let poetry = document.get("tool").and_then(|t| t.get("poetry"));
        let poetry_tables = [
            (poetry.and_then(|p| p.get("dependencies")), false),
            (poetry.and_then(|p| p.get("dev-dependencies")), true),
            (
                poetry
                    .and_then(|p| p.get("group"))
                    .and_then(|g| g.get("dev"))
                    .and_then(|d| d.get("dependencies")),
                true,
            ),
        ];
        for (table, dev) in poetry_tables {
            for (name, spec) in table.and_then(toml::Value::as_table).into_iter().flatten() {
                if name == "python" {
                    continue;
                }
                let version = match spec {
                    toml::Value::String(version) => Some(version.clone()),
                    toml::Value::Table(table) => table
                        .get("version")
                        .and_then(toml::Value::as_str)
                        .map(str::to_string),
                    other => {
                        warn!(
                            "{}",
                            ManifestError::invalid_entry(path, name, format!("unexpected value {}", other))
                        );
                        continue;
                    }
                };
                let mut dependency = DependencyInfo::new(name, Ecosystem::Python);
                if let Some(version) = version {
                    dependency = dependency.with_metadata("requested", version);
                }
                if dev {
                    dependency = dependency.with_metadata("dev", "true");
                }
                dependencies.push(dependency);
            }
        }

        Ok(dependencies)
    }

    /// `site-packages` directories of project-local and active virtualenvs
    fn site_packages<F: FileSystemTrait>(&self, root: &Path, fs: &F) -> Vec<PathBuf> {
        let mut venvs: Vec<PathBuf> = VENV_DIRS.iter().map(|dir| root.join(dir)).collect();
        venvs.extend(self.virtual_env.clone());

        let mut sites = Vec::new();
        for venv in venvs.iter().filter(|v| fs.is_dir(v)) {
            // Windows layout
            let windows = venv.join("Lib").join("site-packages");
            if fs.is_dir(&windows) {
                sites.push(windows);
            }
            let lib = venv.join("lib");
            for entry in fs.read_dir(&lib).unwrap_or_default() {
                let is_python = entry
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("python"));
                let site = entry.join("site-packages");
                if is_python && fs.is_dir(&site) {
                    sites.push(site);
                }
            }
        }
        sites
    }

    /// Installed package directory or single-module file for a distribution name
    fn installed_location<F: FileSystemTrait>(
        &self,
        sites: &[PathBuf],
        name: &str,
        fs: &F,
    ) -> Option<(PathBuf, Option<String>)> {
        let normalized = normalize_package_name(name);
        for site in sites {
            let package_dir = site.join(&normalized);
            let module_file = site.join(format!("{}.py", normalized));
            let location = if fs.is_dir(&package_dir) {
                package_dir
            } else if fs.exists(&module_file) {
                module_file
            } else {
                continue;
            };
            return Some((location, self.installed_version(site, &normalized, fs)));
        }
        None
    }

    /// Version from `<name>-<version>.dist-info`
    fn installed_version<F: FileSystemTrait>(
        &self,
        site: &Path,
        normalized: &str,
        fs: &F,
    ) -> Option<String> {
        fs.read_dir(site).ok()?.into_iter().find_map(|entry| {
            let file_name = entry.file_name()?.to_string_lossy().into_owned();
            let stem = file_name.strip_suffix(".dist-info")?;
            let (name, version) = stem.rsplit_once('-')?;
            (normalize_package_name(name) == normalized).then(|| version.to_string())
        })
    }

    fn resolve_in_package_root<F: FileSystemTrait>(
        &self,
        location: &Path,
        specifier: &str,
        fs: &F,
    ) -> Option<PathBuf> {
        let rest: Vec<&str> = specifier.split('.').skip(1).collect();
        if !fs.is_dir(location) {
            // Single-module distribution
            return rest.is_empty().then(|| location.to_path_buf());
        }
        let base = rest.iter().fold(location.to_path_buf(), |path, part| path.join(part));
        probe_module_path(fs, &base, EXTENSIONS, INDEX_FILES)
    }
}

impl Default for PythonSupport {
    fn default() -> Self {
        Self::new(None).expect("Failed to compile Python import patterns")
    }
}

fn parse_alias(item: &str) -> Option<(String, Option<String>)> {
    let words: Vec<&str> = item.split_whitespace().collect();
    match words.as_slice() {
        [name] => Some((name.to_string(), None)),
        [name, "as", alias] => Some((name.to_string(), Some(alias.to_string()))),
        _ => None,
    }
}

impl<F: FileSystemTrait> LanguageSupport<F> for PythonSupport {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn manifest_files(&self) -> &'static [&'static str] {
        &["requirements.txt", "pyproject.toml"]
    }

    fn parse_manifest(&self, root: &Path, fs: &F) -> Result<Vec<DependencyInfo>, ManifestError> {
        let mut dependencies = Vec::new();

        let requirements = root.join("requirements.txt");
        if let Some(content) = read_manifest(fs, &requirements)? {
            dependencies.extend(self.parse_requirements_txt(&requirements, &content));
        }
        let pyproject = root.join("pyproject.toml");
        if let Some(content) = read_manifest(fs, &pyproject)? {
            dependencies.extend(self.parse_pyproject(&pyproject, &content)?);
        }

        let mut seen = BTreeSet::new();
        dependencies.retain(|d| seen.insert(normalize_package_name(&d.name)));

        let sites = self.site_packages(root, fs);
        debug!("Python site-packages candidates: {:?}", sites);
        for dependency in &mut dependencies {
            if let Some((location, version)) = self.installed_location(&sites, &dependency.name, fs)
            {
                dependency.location = Some(location);
                if dependency.version.is_none() {
                    dependency.version = version;
                }
            }
        }
        Ok(dependencies)
    }

    fn parse_imports(&self, source: &str) -> Vec<ImportInfo> {
        let mut found: Vec<(usize, ImportInfo)> = Vec::new();

        for captures in self.import_stmt.captures_iter(source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let list = captures.get(1).map_or("", |m| m.as_str());
            for (offset, item) in list.split(',').enumerate() {
                let Some((module, alias)) = parse_alias(item) else {
                    continue;
                };
                // `import a.b` binds `a` to package `a`; `import a.b as c` binds `c` to `a.b`
                let (module, local) = match alias {
                    Some(alias) => (module, alias),
                    None => {
                        let top = module.split('.').next().unwrap_or(&module).to_string();
                        (top.clone(), top)
                    }
                };
                found.push((
                    start + offset,
                    ImportInfo::new(module, vec![ImportSpecifier::namespace(local)]),
                ));
            }
        }

        for captures in self.from_stmt.captures_iter(source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let module = captures.get(1).map_or("", |m| m.as_str());
            let names = captures.get(2).map_or("", |m| m.as_str());
            let names: String = names
                .trim_matches(['(', ')'])
                .lines()
                .map(|line| line.split('#').next().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ");

            let specifiers = names
                .split(',')
                .filter_map(|item| {
                    let item = item.trim().trim_end_matches('\\').trim();
                    if item == "*" {
                        return Some(ImportSpecifier::namespace("*"));
                    }
                    let (name, alias) = parse_alias(item)?;
                    let local = alias.unwrap_or_else(|| name.clone());
                    Some(ImportSpecifier::named(name, local))
                })
                .collect();
            found.push((start, ImportInfo::new(module, specifiers)));
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, import)| import).collect()
    }

    fn is_relative(&self, specifier: &str) -> bool {
        specifier.starts_with('.')
    }

    fn package_name(&self, specifier: &str) -> String {
        specifier.split('.').next().unwrap_or(specifier).to_string()
    }

    fn matches_dependency(&self, specifier: &str, dependency: &DependencyInfo) -> bool {
        let package = normalize_package_name(&LanguageSupport::<F>::package_name(self, specifier));
        normalize_package_name(&dependency.name) == package
            || dependency
                .location
                .as_ref()
                .and_then(|l| l.file_stem())
                .is_some_and(|stem| normalize_package_name(&stem.to_string_lossy()) == package)
    }

    fn resolve_relative(&self, specifier: &str, importing_file: &Path, fs: &F) -> Option<PathBuf> {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        let mut dir = importing_file.parent()?.to_path_buf();
        for _ in 1..dots {
            dir = dir.parent()?.to_path_buf();
        }
        let rest = &specifier[dots..];
        let base = rest
            .split('.')
            .filter(|part| !part.is_empty())
            .fold(dir, |path, part| path.join(part));
        probe_module_path(fs, &base, EXTENSIONS, INDEX_FILES)
    }

    fn resolve_in_dependency(
        &self,
        specifier: &str,
        dependency: &DependencyInfo,
        fs: &F,
    ) -> Option<PathBuf> {
        let location = dependency.location.as_ref()?;
        self.resolve_in_package_root(location, specifier, fs)
    }

    fn resolve_by_convention(&self, specifier: &str, root: &Path, fs: &F) -> Option<PathBuf> {
        let package = LanguageSupport::<F>::package_name(self, specifier);
        for site in self.site_packages(root, fs) {
            // Typeshed-style stub packages win over the implementation
            for dir in [site.join(format!("{}-stubs", package)), site.join(&package)] {
                if fs.is_dir(&dir)
                    && let Some(found) = self.resolve_in_package_root(&dir, specifier, fs)
                {
                    return Some(found);
                }
            }
            let module_file = site.join(format!("{}.py", package));
            if specifier == package && fs.exists(&module_file) {
                return Some(module_file);
            }
        }
        None
    }

    fn is_dependency_source(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == "py" || ext == "pyi")
    }

    fn select_dependency_files(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let stubs: Vec<PathBuf> = files
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "pyi"))
            .cloned()
            .collect();
        if stubs.is_empty() { files } else { stubs }
    }
}
