//! Core symbol representation
//!
//! `SymbolEntry` is the single normalized shape every provider result is
//! converted into before it reaches the store or the cache.

use lsp_types::SymbolKind;
use serde::{Deserialize, Serialize};

use crate::symbol::location::{Range, SymbolLocation};

/// A symbol produced by a provider for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    /// Symbol name
    pub name: String,

    /// Symbol kind (serialized as the numeric LSP code)
    pub kind: SymbolKind,

    /// Document URI and range
    pub location: SymbolLocation,

    /// Enclosing symbol name (class, namespace, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Free-form detail such as a signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default)]
    pub deprecated: bool,

    /// Symbol comes from a third-party dependency
    #[serde(default)]
    pub is_external: bool,

    /// Dependency name for external symbols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_library: Option<String>,

    /// Nested symbols, in provider order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SymbolEntry>>,
}

impl SymbolEntry {
    /// Create a new top-level symbol with no children
    pub fn new(name: impl Into<String>, kind: SymbolKind, location: SymbolLocation) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            container_name: None,
            detail: None,
            deprecated: false,
            is_external: false,
            source_library: None,
            children: None,
        }
    }

    pub fn with_container(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = Some(container_name.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SymbolEntry>) -> Self {
        self.children = if children.is_empty() {
            None
        } else {
            Some(children)
        };
        self
    }

    pub fn range(&self) -> Range {
        self.location.range
    }

    /// Number of symbols in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .map(|children| children.iter().map(SymbolEntry::subtree_len).sum::<usize>())
            .unwrap_or(0)
    }

    /// Mark this subtree as belonging to an external dependency
    pub fn mark_external(&mut self, library: &str) {
        self.is_external = true;
        self.source_library = Some(library.to_string());
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.mark_external(library);
            }
        }
    }

    /// Depth-first pre-order walk over the subtree
    pub fn walk(&self) -> SymbolWalk<'_> {
        SymbolWalk { stack: vec![self] }
    }
}

/// Total symbol count across a slice of top-level symbols
pub fn count_symbols(symbols: &[SymbolEntry]) -> usize {
    symbols.iter().map(SymbolEntry::subtree_len).sum()
}

/// Pre-order iterator over a symbol subtree
pub struct SymbolWalk<'a> {
    stack: Vec<&'a SymbolEntry>,
}

impl<'a> Iterator for SymbolWalk<'a> {
    type Item = &'a SymbolEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let symbol = self.stack.pop()?;
        if let Some(children) = &symbol.children {
            // reversed so the first child is visited next
            self.stack.extend(children.iter().rev());
        }
        Some(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_class() -> SymbolEntry {
        let location = SymbolLocation::new("file:///src/math.ts", Range::new(0, 0, 20, 1));
        SymbolEntry::new("Calculator", SymbolKind::CLASS, location.clone()).with_children(vec![
            SymbolEntry::new("add", SymbolKind::METHOD, location.clone()),
            SymbolEntry::new("sub", SymbolKind::METHOD, location),
        ])
    }

    #[test]
    fn test_subtree_len_counts_children() {
        assert_eq!(sample_class().subtree_len(), 3);
        assert_eq!(count_symbols(&[sample_class(), sample_class()]), 6);
    }

    #[test]
    fn test_walk_is_pre_order() {
        let class = sample_class();
        let names: Vec<&str> = class.walk().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Calculator", "add", "sub"]);
    }

    #[test]
    fn test_mark_external_propagates() {
        let mut class = sample_class();
        class.mark_external("mathlib");
        assert!(class.walk().all(|s| s.is_external));
        assert!(
            class
                .walk()
                .all(|s| s.source_library.as_deref() == Some("mathlib"))
        );
    }

    #[test]
    fn test_serialization_uses_camel_case_and_numeric_kind() {
        let symbol = SymbolEntry::new(
            "main",
            SymbolKind::FUNCTION,
            SymbolLocation::new("file:///src/main.go", Range::new(2, 0, 4, 1)),
        )
        .with_container("main");

        let json = serde_json::to_value(&symbol).unwrap();
        assert_eq!(json["kind"], 12);
        assert_eq!(json["containerName"], "main");
        assert_eq!(json["isExternal"], false);
        assert!(json.get("children").is_none());

        let back: SymbolEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, symbol);
    }
}
