//! Bounded-concurrency indexing pipeline
//!
//! A fixed pool of tokio workers pulls files from a shared queue, so the
//! number of in-flight provider requests never exceeds the pool size. Each
//! finished file is committed to the store and the cache before the worker
//! takes the next one. Per-file failures are collected and never abort the
//! batch.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, instrument, trace, warn};

use crate::config::clamp_concurrency;
use crate::index::cache::{CacheEntry, CacheStorage};
use crate::index::diff::{ChangeDetection, current_marker};
use crate::index::progress::{IndexProgress, ProgressObserver};
use crate::index::store::SymbolStore;
use crate::io::FileSystemTrait;
use crate::log_timing;
use crate::provider::{ProviderError, SymbolProvider};
use crate::symbol::{SymbolEntry, count_symbols, uri_from_path};

/// Whose files a run indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    /// Project sources
    Project,
    /// Files of a third-party dependency; symbols are tagged external
    External { library: String },
}

impl IndexTarget {
    pub fn external(library: impl Into<String>) -> Self {
        Self::External {
            library: library.into(),
        }
    }

    fn library(&self) -> Option<&str> {
        match self {
            Self::Project => None,
            Self::External { library } => Some(library),
        }
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::External { library } => write!(f, "dependency:{}", library),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub files_indexed: usize,
    /// Files committed during the run, sorted
    pub indexed: Vec<PathBuf>,
    pub total_symbols: usize,
    pub duration_ms: u64,
    pub errors: Vec<FileError>,
    pub cancelled: bool,
}

enum FileOutcome {
    Indexed { path: PathBuf, symbols: usize },
    Failed { path: PathBuf, error: String },
    Cancelled,
}

/// Shared state handed to every worker
struct WorkerContext<F: FileSystemTrait> {
    provider: Arc<dyn SymbolProvider>,
    store: Arc<SymbolStore>,
    cache: Arc<dyn CacheStorage>,
    fs: F,
    detection: ChangeDetection,
    timeout: Option<Duration>,
    target: IndexTarget,
}

impl<F: FileSystemTrait> WorkerContext<F> {
    async fn fetch(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.provider.document_symbols(uri))
                .await
                .map_err(|_| ProviderError::Timeout {
                    uri: uri.to_string(),
                    timeout,
                })?,
            None => self.provider.document_symbols(uri).await,
        }
    }

    async fn index_one(&self, path: &Path, cancel: &CancellationToken) -> FileOutcome {
        let fs = self.fs.clone();
        let marker_path = path.to_path_buf();
        let detection = self.detection;
        let marker = tokio::task::spawn_blocking(move || current_marker(&fs, &marker_path, detection))
            .await
            .map_err(std::io::Error::other)
            .and_then(|result| result);
        let marker = match marker {
            Ok(marker) => marker,
            Err(e) => return self.fail(path, format!("Cannot read file: {}", e)).await,
        };

        let uri = uri_from_path(path);
        let result = tokio::select! {
            _ = cancel.cancelled() => return FileOutcome::Cancelled,
            result = self.fetch(&uri) => result,
        };

        let mut symbols = match result {
            Ok(symbols) => symbols,
            Err(e) => return self.fail(path, e.to_string()).await,
        };

        let mut entry = CacheEntry::new(path, marker, Vec::new());
        if let Some(library) = self.target.library() {
            symbols.iter_mut().for_each(|s| s.mark_external(library));
            entry = entry.with_source_library(library);
        }
        let symbol_count = count_symbols(&symbols);
        entry.symbols = symbols;

        if let Err(e) = self.cache.put(&entry).await {
            warn!("Failed to cache symbols for {}: {}", path.display(), e);
        }
        self.store
            .index_file(path, entry.marker, entry.symbols)
            .await;

        trace!("Indexed {} ({} symbols)", path.display(), symbol_count);
        FileOutcome::Indexed {
            path: path.to_path_buf(),
            symbols: symbol_count,
        }
    }

    async fn fail(&self, path: &Path, error: String) -> FileOutcome {
        debug!("Indexing failed for {}: {}", path.display(), error);
        self.store.record_error(path, error.clone()).await;
        FileOutcome::Failed {
            path: path.to_path_buf(),
            error,
        }
    }
}

pub struct IndexingPipeline<F: FileSystemTrait> {
    provider: Arc<dyn SymbolProvider>,
    store: Arc<SymbolStore>,
    cache: Arc<dyn CacheStorage>,
    fs: F,
    concurrency: usize,
    detection: ChangeDetection,
    timeout: Option<Duration>,
}

impl<F: FileSystemTrait> IndexingPipeline<F> {
    pub fn new(
        provider: Arc<dyn SymbolProvider>,
        store: Arc<SymbolStore>,
        cache: Arc<dyn CacheStorage>,
        fs: F,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            fs,
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            detection: ChangeDetection::default(),
            timeout: None,
        }
    }

    /// Requested concurrency is clamped into `1..=MAX_CONCURRENCY`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = clamp_concurrency(concurrency);
        self
    }

    pub fn with_change_detection(mut self, detection: ChangeDetection) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Index `files`, committing each result as soon as it arrives
    #[instrument(name = "pipeline_run", skip_all, fields(files = files.len(), target = %target))]
    pub async fn run(
        &self,
        files: Vec<PathBuf>,
        target: IndexTarget,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let start = Instant::now();
        let total = files.len();
        let mut report = PipelineReport::default();

        if total == 0 {
            observer.on_complete(0, 0);
            return report;
        }

        let workers = self.concurrency.min(total);
        debug!("Indexing {} files with {} workers", total, workers);

        let context = Arc::new(WorkerContext {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            fs: self.fs.clone(),
            detection: self.detection,
            timeout: self.timeout,
            target,
        });
        let queue = Arc::new(Mutex::new(VecDeque::from(files)));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let context = Arc::clone(&context);
            let queue = Arc::clone(&queue);
            let sender = sender.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(path) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let outcome = context.index_one(&path, &cancel).await;
                    let cancelled = matches!(outcome, FileOutcome::Cancelled);
                    if sender.send(outcome).is_err() || cancelled {
                        break;
                    }
                }
            });
        }
        drop(sender);

        let mut completed = 0;
        while let Some(outcome) = receiver.recv().await {
            let current_file = match outcome {
                FileOutcome::Indexed { path, symbols } => {
                    report.files_indexed += 1;
                    report.total_symbols += symbols;
                    report.indexed.push(path.clone());
                    path
                }
                FileOutcome::Failed { path, error } => {
                    report.errors.push(FileError {
                        file: path.clone(),
                        error,
                    });
                    path
                }
                FileOutcome::Cancelled => continue,
            };
            completed += 1;
            observer.on_progress(&IndexProgress {
                completed,
                total,
                current_file: Some(current_file),
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Indexing worker failed: {}", e);
            }
        }

        report.cancelled = cancel.is_cancelled() && completed < total;
        report.indexed.sort();
        report.errors.sort_by(|a, b| a.file.cmp(&b.file));
        report.duration_ms = start.elapsed().as_millis() as u64;
        observer.on_complete(completed, total);

        log_timing!(Level::DEBUG, "pipeline_run", start.elapsed());
        info!(
            "Indexed {}/{} files ({} symbols, {} errors{}) in {}ms",
            report.files_indexed,
            total,
            report.total_symbols,
            report.errors.len(),
            if report.cancelled { ", cancelled" } else { "" },
            report.duration_ms
        );
        report
    }
}
