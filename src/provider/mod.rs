//! Symbol provider boundary
//!
//! The index never talks to a language server directly. It consumes a
//! [`SymbolProvider`], which returns symbols already normalized into
//! [`SymbolEntry`]. The [`lsp_adapter`] module turns raw LSP
//! `textDocument/documentSymbol` responses into that shape.

pub mod lsp_adapter;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::symbol::SymbolEntry;

pub use lsp_adapter::{DocumentSymbolSource, LspSymbolProvider, normalize_response};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Symbol request failed for {uri}: {message}")]
    RequestFailed { uri: String, message: String },

    #[error("Symbol provider unavailable: {0}")]
    Unavailable(String),

    #[error("Symbol request for {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },

    #[error("Invalid document URI: {0}")]
    InvalidUri(String),
}

impl ProviderError {
    pub fn request_failed(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

/// Capability producing the symbol tree of one document
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    /// Get all symbols of the document at `uri`, in provider order
    async fn document_symbols(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError>;
}

#[async_trait]
impl<P: SymbolProvider + ?Sized> SymbolProvider for Arc<P> {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError> {
        (**self).document_symbols(uri).await
    }
}
