//! Symbol query filters
//!
//! All filters are optional and conjunctive. Kind filters are strict
//! [`KindSet`]s; loose user input is parsed at the boundary with
//! [`KindSet::parse_value`](crate::symbol::KindSet::parse_value).

use std::path::{Path, PathBuf};

use crate::io::file_system::{glob_matches, is_glob};
use crate::symbol::{KindSet, SymbolEntry};

/// File restriction: one path or a glob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFilter {
    /// Absolute path of a single file
    Exact(PathBuf),
    /// Glob matched against absolute and root-relative paths
    Glob(String),
}

impl FileFilter {
    /// Interpret user input: globs stay globs, relative paths are joined to `root`
    pub fn parse(value: &str, root: &Path) -> Self {
        if is_glob(value) {
            return Self::Glob(value.trim_start_matches("./").to_string());
        }
        let path = Path::new(value);
        if path.is_absolute() {
            Self::Exact(path.to_path_buf())
        } else {
            Self::Exact(root.join(path.strip_prefix("./").unwrap_or(path)))
        }
    }

    pub fn matches(&self, path: &Path, root: &Path) -> bool {
        match self {
            Self::Exact(expected) => expected == path,
            Self::Glob(pattern) => {
                glob_matches(pattern, path)
                    || path
                        .strip_prefix(root)
                        .map(|relative| glob_matches(pattern, relative))
                        .unwrap_or(false)
            }
        }
    }
}

/// How `container_name` is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerMatch {
    Exact(String),
    /// Case-insensitive substring
    Contains(String),
}

impl ContainerMatch {
    fn matches(&self, container: Option<&str>) -> bool {
        let Some(container) = container else {
            return false;
        };
        match self {
            Self::Exact(expected) => container == expected,
            Self::Contains(part) => container.to_lowercase().contains(&part.to_lowercase()),
        }
    }
}

/// Treatment of symbols coming from dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExternalFilter {
    /// Project symbols only
    #[default]
    Exclude,
    /// Project and dependency symbols
    Include,
    /// Dependency symbols only
    Only,
}

impl ExternalFilter {
    /// Map the `includeExternal` / `onlyExternal` flags; `only` wins
    pub fn from_flags(include_external: bool, only_external: bool) -> Self {
        match (include_external, only_external) {
            (_, true) => Self::Only,
            (true, false) => Self::Include,
            (false, false) => Self::Exclude,
        }
    }

    fn matches(self, is_external: bool) -> bool {
        match self {
            Self::Exclude => !is_external,
            Self::Include => true,
            Self::Only => is_external,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolQuery {
    /// Case-insensitive substring of the symbol name
    pub name: Option<String>,
    pub kinds: Option<KindSet>,
    pub file: Option<FileFilter>,
    pub container_name: Option<ContainerMatch>,
    /// When false only top-level symbols of each file are considered
    pub include_children: bool,
    pub external: ExternalFilter,
    /// Exact dependency name
    pub source_library: Option<String>,
}

impl Default for SymbolQuery {
    fn default() -> Self {
        Self {
            name: None,
            kinds: None,
            file: None,
            container_name: None,
            include_children: true,
            external: ExternalFilter::Exclude,
            source_library: None,
        }
    }
}

impl SymbolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kinds(mut self, kinds: KindSet) -> Self {
        self.kinds = (!kinds.is_empty()).then_some(kinds);
        self
    }

    pub fn file(mut self, filter: FileFilter) -> Self {
        self.file = Some(filter);
        self
    }

    pub fn container(mut self, container: ContainerMatch) -> Self {
        self.container_name = Some(container);
        self
    }

    pub fn include_children(mut self, include: bool) -> Self {
        self.include_children = include;
        self
    }

    pub fn external(mut self, external: ExternalFilter) -> Self {
        self.external = external;
        self
    }

    pub fn source_library(mut self, library: impl Into<String>) -> Self {
        self.source_library = Some(library.into());
        self
    }

    /// Check every symbol-level filter (the file filter is applied per record)
    pub fn matches_symbol(&self, symbol: &SymbolEntry, container: Option<&str>) -> bool {
        if !self.external.matches(symbol.is_external) {
            return false;
        }
        if let Some(name) = &self.name
            && !symbol.name.to_lowercase().contains(&name.to_lowercase())
        {
            return false;
        }
        if let Some(kinds) = &self.kinds
            && !kinds.contains(symbol.kind)
        {
            return false;
        }
        if let Some(container_match) = &self.container_name
            && !container_match.matches(container)
        {
            return false;
        }
        if let Some(library) = &self.source_library
            && symbol.source_library.as_deref() != Some(library.as_str())
        {
            return false;
        }
        true
    }

    /// Collect matching symbols of one file, flattening children when requested
    pub fn collect_matches(&self, symbols: &[SymbolEntry], out: &mut Vec<SymbolEntry>) {
        for symbol in symbols {
            if self.include_children {
                self.collect_flattened(symbol, None, out);
            } else if self.matches_symbol(symbol, symbol.container_name.as_deref()) {
                out.push(symbol.clone());
            }
        }
    }

    fn collect_flattened(
        &self,
        symbol: &SymbolEntry,
        parent: Option<&str>,
        out: &mut Vec<SymbolEntry>,
    ) {
        let container = symbol.container_name.as_deref().or(parent);
        if self.matches_symbol(symbol, container) {
            let mut flat = symbol.clone();
            flat.children = None;
            flat.container_name = container.map(str::to_string);
            out.push(flat);
        }
        if let Some(children) = &symbol.children {
            for child in children {
                self.collect_flattened(child, Some(&symbol.name), out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Range, SymbolLocation};
    use lsp_types::SymbolKind;

    fn tree() -> Vec<SymbolEntry> {
        let loc = SymbolLocation::new("file:///p/src/shapes.ts", Range::default());
        vec![
            SymbolEntry::new("Shape", SymbolKind::INTERFACE, loc.clone()),
            SymbolEntry::new("Circle", SymbolKind::CLASS, loc.clone()).with_children(vec![
                SymbolEntry::new("radius", SymbolKind::PROPERTY, loc.clone()),
                SymbolEntry::new("area", SymbolKind::METHOD, loc.clone()),
            ]),
        ]
    }

    fn names(query: &SymbolQuery) -> Vec<String> {
        let mut out = Vec::new();
        query.collect_matches(&tree(), &mut out);
        out.into_iter().map(|s| s.name).collect()
    }

    #[test]
    fn test_empty_query_flattens_everything() {
        assert_eq!(
            names(&SymbolQuery::new()),
            vec!["Shape", "Circle", "radius", "area"]
        );
    }

    #[test]
    fn test_top_level_only() {
        assert_eq!(
            names(&SymbolQuery::new().include_children(false)),
            vec!["Shape", "Circle"]
        );
    }

    #[test]
    fn test_name_is_case_insensitive_substring() {
        assert_eq!(names(&SymbolQuery::new().name("CIR")), vec!["Circle"]);
        assert_eq!(names(&SymbolQuery::new().name("a")), vec!["Shape", "radius", "area"]);
    }

    #[test]
    fn test_container_filter_uses_parent_name() {
        let exact = SymbolQuery::new().container(ContainerMatch::Exact("Circle".into()));
        assert_eq!(names(&exact), vec!["radius", "area"]);

        let contains = SymbolQuery::new().container(ContainerMatch::Contains("circ".into()));
        assert_eq!(names(&contains), vec!["radius", "area"]);

        let mut out = Vec::new();
        exact.collect_matches(&tree(), &mut out);
        assert_eq!(out[0].container_name.as_deref(), Some("Circle"));
        assert!(out.iter().all(|s| s.children.is_none()));
    }

    #[test]
    fn test_kind_filter() {
        let query = SymbolQuery::new().kinds(KindSet::single(SymbolKind::METHOD));
        assert_eq!(names(&query), vec!["area"]);
    }

    #[test]
    fn test_external_filter_flags() {
        assert_eq!(ExternalFilter::from_flags(false, false), ExternalFilter::Exclude);
        assert_eq!(ExternalFilter::from_flags(true, false), ExternalFilter::Include);
        assert_eq!(ExternalFilter::from_flags(false, true), ExternalFilter::Only);

        let mut external = tree();
        for symbol in &mut external {
            symbol.mark_external("geometry");
        }
        let mut out = Vec::new();
        SymbolQuery::new().collect_matches(&external, &mut out);
        assert!(out.is_empty());

        SymbolQuery::new()
            .external(ExternalFilter::Only)
            .source_library("geometry")
            .collect_matches(&external, &mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_file_filter_parse_and_match() {
        let root = Path::new("/p");
        let exact = FileFilter::parse("src/shapes.ts", root);
        assert_eq!(exact, FileFilter::Exact(PathBuf::from("/p/src/shapes.ts")));
        assert!(exact.matches(Path::new("/p/src/shapes.ts"), root));

        let glob = FileFilter::parse("src/**/*.ts", root);
        assert!(glob.matches(Path::new("/p/src/shapes.ts"), root));
        assert!(glob.matches(Path::new("/p/src/deep/x.ts"), root));
        assert!(!glob.matches(Path::new("/p/lib/x.ts"), root));
    }
}
