//! In-memory symbol store
//!
//! One record per absolute file path. Every mutation of a record happens
//! under a single write lock acquisition, so readers never observe a file
//! with half of its symbols replaced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::trace;

use crate::index::diff::ModificationMarker;
use crate::index::query::SymbolQuery;
use crate::symbol::{SymbolEntry, count_symbols};

/// Indexed state of one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndexRecord {
    pub path: PathBuf,
    /// `None` until the file was indexed successfully once
    pub marker: Option<ModificationMarker>,
    pub symbols: Vec<SymbolEntry>,
    pub last_error: Option<String>,
}

impl FileIndexRecord {
    pub fn is_indexed(&self) -> bool {
        self.marker.is_some()
    }
}

/// Aggregate statistics, recomputed from the live store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_files: usize,
    /// Top-level symbols plus all nested children
    pub total_symbols: usize,
    pub indexing_time_ms: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<PathBuf, FileIndexRecord>,
    last_indexing_ms: u64,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SymbolStore {
    root: PathBuf,
    state: RwLock<StoreState>,
}

impl SymbolStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace everything stored for `path`
    pub async fn index_file(
        &self,
        path: &Path,
        marker: ModificationMarker,
        symbols: Vec<SymbolEntry>,
    ) {
        trace!("Storing {} symbols for {}", symbols.len(), path.display());
        let record = FileIndexRecord {
            path: path.to_path_buf(),
            marker: Some(marker),
            symbols,
            last_error: None,
        };
        self.state
            .write()
            .await
            .records
            .insert(path.to_path_buf(), record);
    }

    /// Remember the last failure for `path`, keeping previously indexed symbols
    pub async fn record_error(&self, path: &Path, message: impl Into<String>) {
        let mut state = self.state.write().await;
        let record = state
            .records
            .entry(path.to_path_buf())
            .or_insert_with(|| FileIndexRecord {
                path: path.to_path_buf(),
                marker: None,
                symbols: Vec::new(),
                last_error: None,
            });
        record.last_error = Some(message.into());
    }

    /// Returns true when a record existed
    pub async fn remove_file(&self, path: &Path) -> bool {
        self.state.write().await.records.remove(path).is_some()
    }

    pub async fn clear(&self) {
        *self.state.write().await = StoreState::default();
    }

    /// Record the duration and completion time of an indexing run
    pub async fn mark_indexed(&self, duration_ms: u64) {
        let mut state = self.state.write().await;
        state.last_indexing_ms = duration_ms;
        state.last_updated = Some(Utc::now());
    }

    pub async fn query(&self, query: &SymbolQuery) -> Vec<SymbolEntry> {
        let state = self.state.read().await;

        let mut records: Vec<&FileIndexRecord> = state
            .records
            .values()
            .filter(|record| {
                query
                    .file
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&record.path, &self.root))
            })
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let mut results = Vec::new();
        for record in records {
            query.collect_matches(&record.symbols, &mut results);
        }
        results
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let indexed = state.records.values().filter(|r| r.is_indexed());
        let (total_files, total_symbols) = indexed.fold((0, 0), |(files, symbols), record| {
            (files + 1, symbols + count_symbols(&record.symbols))
        });
        IndexStats {
            total_files,
            total_symbols,
            indexing_time_ms: state.last_indexing_ms,
            last_updated: state.last_updated,
        }
    }

    /// Paths of successfully indexed files, sorted
    pub async fn files(&self) -> Vec<PathBuf> {
        let state = self.state.read().await;
        let mut files: Vec<PathBuf> = state
            .records
            .values()
            .filter(|r| r.is_indexed())
            .map(|r| r.path.clone())
            .collect();
        files.sort();
        files
    }

    pub async fn symbols_for(&self, path: &Path) -> Option<Vec<SymbolEntry>> {
        self.state
            .read()
            .await
            .records
            .get(path)
            .filter(|r| r.is_indexed())
            .map(|r| r.symbols.clone())
    }

    pub async fn record(&self, path: &Path) -> Option<FileIndexRecord> {
        self.state.read().await.records.get(path).cloned()
    }

    pub async fn contains(&self, path: &Path) -> bool {
        self.state
            .read()
            .await
            .records
            .get(path)
            .is_some_and(|r| r.is_indexed())
    }

    pub async fn is_empty(&self) -> bool {
        !self
            .state
            .read()
            .await
            .records
            .values()
            .any(|r| r.is_indexed())
    }
}
