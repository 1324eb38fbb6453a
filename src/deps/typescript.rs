//! TypeScript / JavaScript support (npm packages)

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

use crate::deps::error::read_manifest;
use crate::deps::{
    DependencyInfo, Ecosystem, ImportInfo, ImportSpecifier, LanguageSupport, ManifestError,
    normalize_path, probe_module_path,
};
use crate::io::FileSystemTrait;

const EXTENSIONS: &[&str] = &["ts", "tsx", "d.ts", "js", "jsx", "mts", "mjs", "cjs"];
const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.d.ts",
    "index.js",
    "index.jsx",
    "index.mjs",
];
const DECLARATION_SUFFIXES: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];
const SOURCE_SUFFIXES: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"];

/// package.json sections and the metadata flag recorded for each
const DEPENDENCY_SECTIONS: &[(&str, Option<&str>)] = &[
    ("dependencies", None),
    ("devDependencies", Some("dev")),
    ("peerDependencies", Some("peer")),
    ("optionalDependencies", Some("optional")),
];

#[derive(Debug, Clone)]
pub struct TypeScriptSupport {
    import_from: Regex,
    side_effect: Regex,
    export_from: Regex,
    require: Regex,
}

impl TypeScriptSupport {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // import X, { a as b } from 'm' / import type { T } from 'm' / import * as N from 'm'
            import_from: Regex::new(
                r#"(?s)\bimport\s+(type\s+)?([\w$*{][^;'"]*?)\s*from\s*['"]([^'"]+)['"]"#,
            )?,
            // import 'polyfill'
            side_effect: Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#)?,
            // export { a } from 'm' / export * from 'm' / export * as ns from 'm'
            export_from: Regex::new(
                r#"(?s)\bexport\s+(type\s+)?(\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"]([^'"]+)['"]"#,
            )?,
            // const x = require('m') / const { a, b: c } = require('m')
            require: Regex::new(
                r#"\b(?:const|let|var)\s+([\w$]+|\{[^}]*\})\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#,
            )?,
        })
    }

    /// Entry file of an installed package: `types`, `typings`, `main`, then index files
    fn package_entry<F: FileSystemTrait>(&self, package_dir: &Path, fs: &F) -> Option<PathBuf> {
        let manifest = package_dir.join("package.json");
        let package: Option<Value> = fs
            .read_to_string(&manifest)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok());

        if let Some(package) = &package {
            for key in ["types", "typings"] {
                if let Some(entry) = package.get(key).and_then(Value::as_str) {
                    let candidate = normalize_path(&package_dir.join(entry));
                    if let Some(found) = probe_module_path(fs, &candidate, EXTENSIONS, INDEX_FILES) {
                        return Some(found);
                    }
                }
            }
            if let Some(main) = package.get("main").and_then(Value::as_str) {
                let candidate = normalize_path(&package_dir.join(main));
                // Prefer the declaration file shipped next to the compiled entry
                let declaration = strip_script_extension(&candidate)
                    .map(|stem| PathBuf::from(format!("{}.d.ts", stem.display())));
                if let Some(declaration) = declaration
                    && fs.exists(&declaration)
                {
                    return Some(declaration);
                }
                if let Some(found) = probe_module_path(fs, &candidate, EXTENSIONS, INDEX_FILES) {
                    return Some(found);
                }
            }
        }

        probe_module_path(fs, package_dir, &[], INDEX_FILES)
    }

    fn resolve_in_package<F: FileSystemTrait>(
        &self,
        package_dir: &Path,
        subpath: &str,
        fs: &F,
    ) -> Option<PathBuf> {
        if subpath.is_empty() {
            self.package_entry(package_dir, fs)
        } else {
            probe_module_path(fs, &package_dir.join(subpath), EXTENSIONS, INDEX_FILES)
        }
    }

    fn subpath<'a>(&self, specifier: &'a str) -> &'a str {
        let name = self.package_of(specifier);
        specifier
            .get(name.len()..)
            .unwrap_or("")
            .trim_start_matches('/')
    }

    /// `@scope/pkg/sub` belongs to `@scope/pkg`, `pkg/sub` to `pkg`
    fn package_of(&self, specifier: &str) -> String {
        let mut segments = specifier.split('/');
        match (segments.next(), segments.next()) {
            (Some(scope), Some(name)) if scope.starts_with('@') => format!("{}/{}", scope, name),
            (Some(name), _) => name.to_string(),
            _ => specifier.to_string(),
        }
    }
}

impl Default for TypeScriptSupport {
    fn default() -> Self {
        Self::new().expect("Failed to compile TypeScript import patterns")
    }
}

/// Drop `//` and `/* */` comments, leaving string and template literals intact
///
/// Newlines inside block comments are kept so line-anchored patterns still see
/// statement starts.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if inner == c || (inner == '\n' && c != '`') {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    if inner == '\n' {
                        out.push('\n');
                    }
                    previous = inner;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_script_extension(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    ["js", "mjs", "cjs", "jsx"]
        .iter()
        .find_map(|ext| name.strip_suffix(&format!(".{}", ext)))
        .map(|stem| path.with_file_name(stem))
}

/// `@scope/pkg` is published to DefinitelyTyped as `@types/scope__pkg`
fn types_package_name(package: &str) -> String {
    match package.strip_prefix('@') {
        Some(scoped) => scoped.replacen('/', "__", 1),
        None => package.to_string(),
    }
}

/// Parse `{ a, b as c, type T, default as D }`
fn parse_named_list(list: &str) -> Vec<ImportSpecifier> {
    list.split(',')
        .filter_map(|item| {
            let words: Vec<&str> = item.split_whitespace().collect();
            let words = match words.as_slice() {
                ["type", rest @ ..] if !rest.is_empty() && rest[0] != "as" => rest,
                all => all,
            };
            let (imported, local) = match words {
                [name] => (*name, *name),
                [name, "as", local] => (*name, *local),
                _ => return None,
            };
            Some(if imported == "default" {
                ImportSpecifier::default_import(local)
            } else {
                ImportSpecifier::named(imported, local)
            })
        })
        .collect()
}

/// Parse the clause between `import` and `from`
fn parse_import_clause(clause: &str) -> Vec<ImportSpecifier> {
    let clause = clause.trim();
    let (head, named) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if close > open => {
            (&clause[..open], Some(&clause[open + 1..close]))
        }
        _ => (clause, None),
    };

    let mut specifiers = Vec::new();
    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(rest) = part.strip_prefix('*') {
            let local = rest.trim().trim_start_matches("as").trim();
            if !local.is_empty() {
                specifiers.push(ImportSpecifier::namespace(local));
            }
        } else {
            specifiers.push(ImportSpecifier::default_import(part));
        }
    }
    if let Some(named) = named {
        specifiers.extend(parse_named_list(named));
    }
    specifiers
}

/// Parse `{ a, b: c }` destructuring of a `require` call
fn parse_destructuring(pattern: &str) -> Vec<ImportSpecifier> {
    pattern
        .trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            Some(match item.split_once(':') {
                Some((imported, local)) => ImportSpecifier::named(imported.trim(), local.trim()),
                None => ImportSpecifier::named(item, item),
            })
        })
        .collect()
}

fn capture<'a>(captures: &'a Captures, index: usize) -> &'a str {
    captures.get(index).map(|m| m.as_str()).unwrap_or("")
}

impl<F: FileSystemTrait> LanguageSupport<F> for TypeScriptSupport {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::TypeScript
    }

    fn manifest_files(&self) -> &'static [&'static str] {
        &["package.json"]
    }

    fn parse_manifest(&self, root: &Path, fs: &F) -> Result<Vec<DependencyInfo>, ManifestError> {
        let manifest_path = root.join("package.json");
        let Some(content) = read_manifest(fs, &manifest_path)? else {
            return Ok(Vec::new());
        };
        let manifest: Value = serde_json::from_str(&content)
            .map_err(|e| ManifestError::json(&manifest_path, e))?;

        let mut seen = BTreeSet::new();
        let mut dependencies = Vec::new();
        for (section, flag) in DEPENDENCY_SECTIONS {
            let Some(entries) = manifest.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (name, requested) in entries {
                let Some(requested) = requested.as_str() else {
                    warn!(
                        "{}",
                        ManifestError::invalid_entry(&manifest_path, name, "version is not a string")
                    );
                    continue;
                };
                if !seen.insert(name.clone()) {
                    continue;
                }

                let mut dependency = DependencyInfo::new(name, Ecosystem::TypeScript)
                    .with_metadata("requested", requested);
                if let Some(flag) = flag {
                    dependency = dependency.with_metadata(*flag, "true");
                }

                let installed = root.join("node_modules").join(name);
                if fs.is_dir(&installed) {
                    let version = fs
                        .read_to_string(&installed.join("package.json"))
                        .ok()
                        .and_then(|c| serde_json::from_str::<Value>(&c).ok())
                        .and_then(|p| p.get("version").and_then(Value::as_str).map(str::to_string));
                    dependency = dependency.with_version(version.unwrap_or_else(|| requested.to_string()));
                    dependency.location = Some(installed);
                } else {
                    dependency = dependency.with_version(requested);
                }
                dependencies.push(dependency);
            }
        }
        Ok(dependencies)
    }

    fn parse_imports(&self, source: &str) -> Vec<ImportInfo> {
        let source = strip_comments(source);
        let mut found: Vec<(usize, ImportInfo)> = Vec::new();

        for captures in self.import_from.captures_iter(&source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let import = ImportInfo::new(
                capture(&captures, 3),
                parse_import_clause(capture(&captures, 2)),
            )
            .type_only(captures.get(1).is_some());
            found.push((start, import));
        }

        for captures in self.side_effect.captures_iter(&source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            found.push((start, ImportInfo::new(capture(&captures, 1), Vec::new())));
        }

        for captures in self.export_from.captures_iter(&source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let clause = capture(&captures, 2);
            let specifiers = if let Some(named) = clause.strip_prefix('{') {
                parse_named_list(named.trim_end_matches('}'))
            } else {
                parse_import_clause(clause)
            };
            let import = ImportInfo::new(capture(&captures, 3), specifiers)
                .type_only(captures.get(1).is_some());
            found.push((start, import));
        }

        for captures in self.require.captures_iter(&source) {
            let start = captures.get(0).map_or(0, |m| m.start());
            let binding = capture(&captures, 1);
            let specifiers = if binding.starts_with('{') {
                parse_destructuring(binding)
            } else {
                vec![ImportSpecifier::namespace(binding)]
            };
            found.push((start, ImportInfo::new(capture(&captures, 2), specifiers)));
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, import)| import).collect()
    }

    fn is_relative(&self, specifier: &str) -> bool {
        specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/')
    }

    fn package_name(&self, specifier: &str) -> String {
        self.package_of(specifier)
    }

    fn resolve_relative(&self, specifier: &str, importing_file: &Path, fs: &F) -> Option<PathBuf> {
        let base = normalize_path(&importing_file.parent()?.join(specifier));
        // ESM sources import `./x.js` while the file on disk is `./x.ts`
        if let Some(stem) = strip_script_extension(&base)
            && let Some(found) = probe_module_path(fs, &stem, EXTENSIONS, INDEX_FILES)
        {
            return Some(found);
        }
        probe_module_path(fs, &base, EXTENSIONS, INDEX_FILES)
    }

    fn resolve_in_dependency(
        &self,
        specifier: &str,
        dependency: &DependencyInfo,
        fs: &F,
    ) -> Option<PathBuf> {
        let location = dependency.location.as_ref()?;
        self.resolve_in_package(location, self.subpath(specifier), fs)
    }

    fn resolve_by_convention(&self, specifier: &str, root: &Path, fs: &F) -> Option<PathBuf> {
        let package = self.package_of(specifier);
        let subpath = self.subpath(specifier);
        let node_modules = root.join("node_modules");

        [
            node_modules.join(&package),
            node_modules.join("@types").join(types_package_name(&package)),
        ]
        .iter()
        .filter(|dir| fs.is_dir(dir))
        .find_map(|dir| self.resolve_in_package(dir, subpath, fs))
    }

    fn is_dependency_source(&self, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        !name.ends_with(".min.js")
            && (DECLARATION_SUFFIXES.iter().any(|s| name.ends_with(s))
                || SOURCE_SUFFIXES.iter().any(|s| name.ends_with(s)))
    }

    fn select_dependency_files(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let declarations: Vec<PathBuf> = files
            .iter()
            .filter(|path| {
                let name = path.to_string_lossy();
                DECLARATION_SUFFIXES.iter().any(|s| name.ends_with(s))
            })
            .cloned()
            .collect();
        if declarations.is_empty() {
            files
        } else {
            declarations
        }
    }
}
