//! Adapter from raw LSP document symbol responses to `SymbolEntry`
//!
//! Language servers answer `textDocument/documentSymbol` either with a flat
//! `SymbolInformation[]` or with a nested `DocumentSymbol[]`. Both are folded
//! into the one `SymbolEntry` tree here, so nothing downstream has to care
//! which shape a backend produced.

use async_trait::async_trait;
use lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolInformation, SymbolTag};
use tracing::trace;

use crate::provider::{ProviderError, SymbolProvider};
use crate::symbol::{Range, SymbolEntry, SymbolLocation};

/// Raw source of LSP document symbol responses (typically a language server client)
#[async_trait]
pub trait DocumentSymbolSource: Send + Sync {
    /// Issue `textDocument/documentSymbol`; `None` mirrors a `null` result
    async fn document_symbol(
        &self,
        uri: &str,
    ) -> Result<Option<DocumentSymbolResponse>, ProviderError>;
}

/// `SymbolProvider` backed by a `DocumentSymbolSource`
pub struct LspSymbolProvider<S: DocumentSymbolSource> {
    source: S,
}

impl<S: DocumentSymbolSource> LspSymbolProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: DocumentSymbolSource> SymbolProvider for LspSymbolProvider<S> {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError> {
        let response = self.source.document_symbol(uri).await?;
        let symbols = response
            .map(|response| normalize_response(uri, response))
            .unwrap_or_default();
        trace!("Normalized {} top-level symbols for {}", symbols.len(), uri);
        Ok(symbols)
    }
}

/// Fold either response shape into `SymbolEntry` trees
pub fn normalize_response(uri: &str, response: DocumentSymbolResponse) -> Vec<SymbolEntry> {
    match response {
        DocumentSymbolResponse::Flat(infos) => infos.iter().map(from_symbol_information).collect(),
        DocumentSymbolResponse::Nested(symbols) => symbols
            .iter()
            .map(|symbol| from_document_symbol(uri, symbol, None))
            .collect(),
    }
}

fn is_deprecated(tags: Option<&Vec<SymbolTag>>, flag: Option<bool>) -> bool {
    flag.unwrap_or(false) || tags.is_some_and(|tags| tags.contains(&SymbolTag::DEPRECATED))
}

#[allow(deprecated)]
fn from_document_symbol(uri: &str, symbol: &DocumentSymbol, container: Option<&str>) -> SymbolEntry {
    let children = symbol
        .children
        .as_ref()
        .map(|children| {
            children
                .iter()
                .map(|child| from_document_symbol(uri, child, Some(&symbol.name)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut entry = SymbolEntry::new(
        symbol.name.clone(),
        symbol.kind,
        SymbolLocation::new(uri, Range::from(symbol.range)),
    )
    .with_children(children);
    entry.container_name = container.map(str::to_string);
    entry.detail = symbol.detail.clone().filter(|d| !d.is_empty());
    entry.deprecated = is_deprecated(symbol.tags.as_ref(), symbol.deprecated);
    entry
}

#[allow(deprecated)]
fn from_symbol_information(info: &SymbolInformation) -> SymbolEntry {
    let mut entry = SymbolEntry::new(
        info.name.clone(),
        info.kind,
        SymbolLocation::from(&info.location),
    );
    entry.container_name = info.container_name.clone().filter(|c| !c.is_empty());
    entry.deprecated = is_deprecated(info.tags.as_ref(), info.deprecated);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Location, Position, SymbolKind, Uri};
    use std::str::FromStr;

    fn lsp_range(start: u32, end: u32) -> lsp_types::Range {
        lsp_types::Range {
            start: Position {
                line: start,
                character: 0,
            },
            end: Position {
                line: end,
                character: 1,
            },
        }
    }

    #[allow(deprecated)]
    fn document_symbol(
        name: &str,
        kind: SymbolKind,
        children: Option<Vec<DocumentSymbol>>,
    ) -> DocumentSymbol {
        DocumentSymbol {
            name: name.to_string(),
            detail: Some("detail".to_string()),
            kind,
            tags: None,
            deprecated: None,
            range: lsp_range(1, 10),
            selection_range: lsp_range(1, 1),
            children,
        }
    }

    struct FixedSource(Option<DocumentSymbolResponse>);

    #[async_trait]
    impl DocumentSymbolSource for FixedSource {
        async fn document_symbol(
            &self,
            _uri: &str,
        ) -> Result<Option<DocumentSymbolResponse>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_nested_response_keeps_hierarchy() {
        let response = DocumentSymbolResponse::Nested(vec![document_symbol(
            "Server",
            SymbolKind::CLASS,
            Some(vec![document_symbol("start", SymbolKind::METHOD, None)]),
        )]);

        let symbols = normalize_response("file:///src/server.ts", response);

        assert_eq!(symbols.len(), 1);
        let class = &symbols[0];
        assert_eq!(class.name, "Server");
        assert_eq!(class.container_name, None);
        assert_eq!(class.location.uri, "file:///src/server.ts");
        let children = class.children.as_ref().unwrap();
        assert_eq!(children[0].name, "start");
        assert_eq!(children[0].container_name.as_deref(), Some("Server"));
        assert_eq!(children[0].detail.as_deref(), Some("detail"));
    }

    #[test]
    #[allow(deprecated)]
    fn test_flat_response_is_normalized() {
        let info = SymbolInformation {
            name: "helper".to_string(),
            kind: SymbolKind::FUNCTION,
            tags: Some(vec![SymbolTag::DEPRECATED]),
            deprecated: None,
            location: Location {
                uri: Uri::from_str("file:///src/util.py").unwrap(),
                range: lsp_range(4, 8),
            },
            container_name: Some("util".to_string()),
        };

        let symbols = normalize_response(
            "file:///src/util.py",
            DocumentSymbolResponse::Flat(vec![info]),
        );

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "helper");
        assert_eq!(symbols[0].container_name.as_deref(), Some("util"));
        assert!(symbols[0].deprecated);
        assert!(symbols[0].children.is_none());
        assert_eq!(symbols[0].location.range.start.line, 4);
    }

    #[tokio::test]
    async fn test_null_response_yields_no_symbols() {
        let provider = LspSymbolProvider::new(FixedSource(None));
        let symbols = provider.document_symbols("file:///empty.go").await.unwrap();
        assert!(symbols.is_empty());
    }
}
