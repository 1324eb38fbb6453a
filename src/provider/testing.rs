//! Testing utilities: an instrumented in-memory symbol provider

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::SymbolKind;

use crate::provider::{ProviderError, SymbolProvider};
use crate::symbol::{Range, SymbolEntry, SymbolLocation, path_from_uri, uri_from_path};

/// Build `count` function symbols for a file
pub fn function_symbols(path: &Path, count: usize) -> Vec<SymbolEntry> {
    let uri = uri_from_path(path);
    (0..count)
        .map(|i| {
            SymbolEntry::new(
                format!("fn_{}", i),
                SymbolKind::FUNCTION,
                SymbolLocation::new(uri.clone(), Range::new(i as u32, 0, i as u32, 10)),
            )
        })
        .collect()
}

/// Provider returning scripted results and recording how it was called
///
/// Files without a scripted result get a single function symbol named
/// after the file stem.
#[derive(Default)]
pub struct TestSymbolProvider {
    symbols: Mutex<HashMap<String, Vec<SymbolEntry>>>,
    failures: Mutex<HashMap<String, String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TestSymbolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_symbols(&self, path: &Path, symbols: Vec<SymbolEntry>) {
        self.symbols
            .lock()
            .unwrap()
            .insert(uri_from_path(path), symbols);
    }

    pub fn fail_for(&self, path: &Path, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(uri_from_path(path), message.to_string());
    }

    /// URIs requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Highest number of simultaneously running requests observed
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SymbolProvider for TestSymbolProvider {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError> {
        self.calls.lock().unwrap().push(uri.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = if let Some(message) = self.failures.lock().unwrap().get(uri) {
            Err(ProviderError::request_failed(uri, message.clone()))
        } else if let Some(symbols) = self.symbols.lock().unwrap().get(uri) {
            Ok(symbols.clone())
        } else {
            let stem = path_from_uri(uri)
                .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "symbol".to_string());
            Ok(vec![SymbolEntry::new(
                stem,
                SymbolKind::FUNCTION,
                SymbolLocation::new(uri, Range::default()),
            )])
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
