//! Per-root facade over the store, the cache, the pipeline and dependency
//! resolution
//!
//! A `ProjectIndex` hydrates its store from the persistent cache when it is
//! opened, so unchanged files are queryable right away. Store-rebuilding
//! operations (`index_files`, `update_incremental`, `force_clear`) are
//! serialized; queries run concurrently with them and observe whole files.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use lsp_types::SymbolKind;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, instrument, warn};

use crate::config::IndexConfig;
use crate::deps::external::filter_imported;
use crate::deps::resolver::discover_dependencies;
use crate::deps::{
    DependencyInfo, ExternalIndexOptions, ExternalIndexResult, ExternalSymbolIndexer,
    ImportInfo, ImportSpecifier, LanguageSupport, ModuleResolver, ResolvedModule,
    all_language_support, collect_project_imports,
};
use crate::index::cache::{CacheStorage, FilesystemCacheStorage};
use crate::index::diff::{IncrementalDiff, ModificationMarker};
use crate::index::error::IndexError;
use crate::index::pipeline::{FileError, IndexTarget, IndexingPipeline, PipelineReport};
use crate::index::progress::{NoopObserver, ProgressObserver};
use crate::index::query::SymbolQuery;
use crate::index::store::{IndexStats, SymbolStore};
use crate::io::{FilePatterns, FileSystemTrait, RealFileSystem};
use crate::log_timing;
use crate::provider::SymbolProvider;
use crate::symbol::{SymbolEntry, SymbolLocation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFilesResult {
    pub files_indexed: usize,
    pub total_symbols: usize,
    pub duration_ms: u64,
    pub errors: Vec<FileError>,
}

impl From<PipelineReport> for IndexFilesResult {
    fn from(report: PipelineReport) -> Self {
        Self {
            files_indexed: report.files_indexed,
            total_symbols: report.total_symbols,
            duration_ms: report.duration_ms,
            errors: report.errors,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Changed files submitted per pipeline run; all at once when `None`
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalResult {
    /// Files re-fetched and committed, sorted
    pub updated: Vec<PathBuf>,
    /// Files dropped because they no longer match or no longer exist
    pub removed: Vec<PathBuf>,
    pub errors: Vec<FileError>,
    pub success: bool,
}

/// A symbol found by following an import of a project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSymbol {
    pub symbol: SymbolEntry,
    /// Module specifier as written in the import
    pub source_module: String,
    pub resolved_path: PathBuf,
}

pub struct ProjectIndex<F: FileSystemTrait = RealFileSystem> {
    config: IndexConfig,
    patterns: FilePatterns,
    fs: F,
    provider: Arc<dyn SymbolProvider>,
    store: Arc<SymbolStore>,
    cache: Arc<dyn CacheStorage>,
    supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
    observer: Arc<dyn ProgressObserver>,
    write_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl ProjectIndex<RealFileSystem> {
    pub async fn open(
        config: IndexConfig,
        provider: Arc<dyn SymbolProvider>,
    ) -> Result<Self, IndexError> {
        Self::open_with(config, provider, RealFileSystem).await
    }
}

impl<F: FileSystemTrait> ProjectIndex<F> {
    /// Open an index with the filesystem cache under the configured root
    pub async fn open_with(
        config: IndexConfig,
        provider: Arc<dyn SymbolProvider>,
        fs: F,
    ) -> Result<Self, IndexError> {
        let cache = Arc::new(FilesystemCacheStorage::new(config.cache_dir()));
        Self::with_parts(config, provider, fs, cache, all_language_support()).await
    }

    pub async fn with_parts(
        config: IndexConfig,
        provider: Arc<dyn SymbolProvider>,
        fs: F,
        cache: Arc<dyn CacheStorage>,
        supports: Vec<Box<dyn LanguageSupport<F>>>,
    ) -> Result<Self, IndexError> {
        if !fs.is_dir(&config.root) {
            return Err(IndexError::invalid_root(&config.root, "not a directory"));
        }
        let patterns = config.file_patterns()?;

        let index = Self {
            store: Arc::new(SymbolStore::new(&config.root)),
            config,
            patterns,
            fs,
            provider,
            cache,
            supports: Arc::new(supports),
            observer: Arc::new(NoopObserver),
            write_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        };
        index.hydrate().await;
        Ok(index)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Load every readable cache entry into the store
    async fn hydrate(&self) {
        let start = Instant::now();
        let entries = match self.cache.get_all_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable cache: {}", e);
                return;
            }
        };

        let count = entries.len();
        for entry in entries {
            self.store
                .index_file(&entry.path, entry.marker, entry.symbols)
                .await;
        }
        if count > 0 {
            info!("Hydrated {} files from cache", count);
        }
        log_timing!(Level::DEBUG, "hydrate", start.elapsed());
    }

    fn pipeline(&self, concurrency: usize) -> IndexingPipeline<F> {
        IndexingPipeline::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.fs.clone(),
        )
        .with_concurrency(concurrency)
        .with_change_detection(self.config.change_detection)
        .with_timeout(self.config.provider_timeout)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        }
    }

    /// Files currently matched by the configured patterns
    async fn scan_files(&self) -> Result<Vec<PathBuf>, IndexError> {
        let fs = self.fs.clone();
        let root = self.config.root.clone();
        let patterns = self.patterns.clone();
        tokio::task::spawn_blocking(move || fs.expand_patterns(&root, &patterns))
            .await
            .map_err(IndexError::join)
    }

    /// Markers of cached project files; dependency entries are left out
    async fn cached_markers(&self) -> Option<HashMap<PathBuf, ModificationMarker>> {
        match self.cache.get_all_files().await {
            Ok(files) => Some(
                files
                    .into_iter()
                    .filter(|info| info.source_library.is_none())
                    .map(|info| (info.path, info.marker))
                    .collect(),
            ),
            Err(e) => {
                warn!("Cache unavailable, running a full index: {}", e);
                None
            }
        }
    }

    /// Index the given files regardless of their cached state
    #[instrument(name = "index_files", skip_all, fields(files = paths.len()))]
    pub async fn index_files(
        &self,
        paths: &[PathBuf],
        concurrency: Option<usize>,
    ) -> IndexFilesResult {
        let _guard = self.write_lock.lock().await;
        let files: Vec<PathBuf> = paths.iter().map(|p| self.absolute(p)).collect();

        let report = self
            .pipeline(concurrency.unwrap_or(self.config.concurrency))
            .run(
                files,
                IndexTarget::Project,
                self.observer.as_ref(),
                &self.shutdown.child_token(),
            )
            .await;
        self.store.mark_indexed(report.duration_ms).await;
        report.into()
    }

    /// Bring the index up to date with the files matched by the patterns
    #[instrument(name = "update_incremental", skip_all)]
    pub async fn update_incremental(
        &self,
        options: UpdateOptions,
    ) -> Result<IncrementalResult, IndexError> {
        let _guard = self.write_lock.lock().await;
        let start = Instant::now();

        let files = self.scan_files().await?;
        if files.is_empty() {
            return Err(IndexError::no_files_matched(&self.config.root));
        }

        // Files cached but absent from the store (e.g. after `clear`) must be
        // re-fetched even when their marker is unchanged
        let indexed: HashSet<PathBuf> = self.store.files().await.into_iter().collect();
        let missing: Vec<PathBuf> = files
            .iter()
            .filter(|path| !indexed.contains(*path))
            .cloned()
            .collect();

        let cached = self.cached_markers().await;
        let diff = IncrementalDiff::new(self.fs.clone(), self.config.change_detection);
        let mut change_set =
            tokio::task::spawn_blocking(move || diff.compute(&files, cached.as_ref()))
                .await
                .map_err(IndexError::join)?;
        change_set.include_updates(missing);

        let mut result = IncrementalResult {
            removed: change_set.to_remove.clone(),
            ..Default::default()
        };
        for path in &change_set.to_remove {
            self.store.remove_file(path).await;
            if let Err(e) = self.cache.remove(path).await {
                warn!("Failed to drop cache entry for {}: {}", path.display(), e);
            }
        }

        let pipeline = self.pipeline(self.config.concurrency);
        let cancel = self.shutdown.child_token();
        let batch_size = options.batch_size.unwrap_or(usize::MAX).max(1);
        let mut cancelled = false;
        for batch in change_set.to_update.chunks(batch_size) {
            let report = pipeline
                .run(
                    batch.to_vec(),
                    IndexTarget::Project,
                    self.observer.as_ref(),
                    &cancel,
                )
                .await;
            result.updated.extend(report.indexed);
            result.errors.extend(report.errors);
            if report.cancelled {
                cancelled = true;
                break;
            }
        }

        result.updated.sort();
        result.errors.sort_by(|a, b| a.file.cmp(&b.file));
        result.success = result.errors.is_empty() && !cancelled;
        self.store
            .mark_indexed(start.elapsed().as_millis() as u64)
            .await;

        log_timing!(Level::DEBUG, "update_incremental", start.elapsed());
        info!(
            "Incremental update: {} updated, {} removed, {} unchanged, {} errors",
            result.updated.len(),
            result.removed.len(),
            change_set.unchanged,
            result.errors.len()
        );
        Ok(result)
    }

    pub async fn query_symbols(&self, query: &SymbolQuery) -> Vec<SymbolEntry> {
        self.store.query(query).await
    }

    pub async fn get_stats(&self) -> IndexStats {
        self.store.stats().await
    }

    /// Drop in-memory state; the persistent cache is kept
    pub async fn clear(&self) {
        self.store.clear().await;
        debug!("Cleared in-memory index for {}", self.config.root.display());
    }

    /// Drop in-memory state and delete the persistent cache
    pub async fn force_clear(&self) -> Result<(), IndexError> {
        let _guard = self.write_lock.lock().await;
        self.store.clear().await;
        self.cache.clear().await?;
        info!("Deleted index cache for {}", self.config.root.display());
        Ok(())
    }

    pub async fn is_indexed(&self) -> bool {
        !self.store.is_empty().await
    }

    /// Dependencies declared by the manifests of every detected ecosystem
    pub async fn dependencies(&self) -> Result<Vec<DependencyInfo>, IndexError> {
        let fs = self.fs.clone();
        let root = self.config.root.clone();
        let supports = Arc::clone(&self.supports);
        tokio::task::spawn_blocking(move || discover_dependencies(&root, &fs, &supports))
            .await
            .map_err(IndexError::join)
    }

    /// Find the import binding `name` in `file` and resolve the symbol it refers to
    ///
    /// Symbols of a resolved module that is not indexed yet are fetched and
    /// stored first; modules of dependencies are tagged external.
    #[instrument(name = "resolve_symbol_from_imports", skip(self))]
    pub async fn resolve_symbol_from_imports(
        &self,
        name: &str,
        file: &Path,
    ) -> Result<Option<ResolvedSymbol>, IndexError> {
        let file = self.absolute(file);
        let root = self.config.root.clone();
        let fs = self.fs.clone();
        let supports = Arc::clone(&self.supports);
        let local = name.to_string();

        let binding = tokio::task::spawn_blocking(move || {
            let resolver = ModuleResolver::discover(root, fs, supports);
            let imports = resolver.imports_of(&file)?;
            let found = imports.into_iter().find_map(|import| {
                let specifier = import.specifier_for(&local).cloned()?;
                Some((import, specifier))
            });
            let Some((import, specifier)) = found else {
                return Ok(None);
            };
            let module = resolver.resolve(&import.source, &file);
            Ok::<_, std::io::Error>(module.map(|module| (import, specifier, module)))
        })
        .await
        .map_err(IndexError::join)??;

        let Some((import, specifier, module)) = binding else {
            debug!("No resolvable import binds '{}'", name);
            return Ok(None);
        };
        let symbol = self.symbol_in_module(&specifier, &module).await;
        Ok(symbol.map(|symbol| ResolvedSymbol {
            symbol,
            source_module: import.source,
            resolved_path: module.path,
        }))
    }

    async fn symbol_in_module(
        &self,
        specifier: &ImportSpecifier,
        module: &ResolvedModule,
    ) -> Option<SymbolEntry> {
        if specifier.is_namespace {
            let mut symbol = SymbolEntry::new(
                specifier.local.clone(),
                SymbolKind::MODULE,
                SymbolLocation::file_start(&module.path),
            );
            if let Some(library) = &module.dependency {
                symbol.mark_external(library);
            }
            return Some(symbol);
        }

        let symbols = match self.store.symbols_for(&module.path).await {
            Some(symbols) => symbols,
            None => {
                self.fetch_module(module).await;
                self.store.symbols_for(&module.path).await?
            }
        };

        let found = if specifier.is_default {
            find_symbol(&symbols, "default").or_else(|| find_symbol(&symbols, &specifier.local))
        } else {
            find_symbol(&symbols, &specifier.imported)
        };
        found.cloned()
    }

    async fn fetch_module(&self, module: &ResolvedModule) {
        let target = match &module.dependency {
            Some(library) => IndexTarget::external(library),
            None => IndexTarget::Project,
        };
        let report = self
            .pipeline(1)
            .run(
                vec![module.path.clone()],
                target,
                &NoopObserver,
                &self.shutdown.child_token(),
            )
            .await;
        if let Some(error) = report.errors.first() {
            debug!("Cannot fetch symbols of {}: {}", module.path.display(), error.error);
        }
    }

    /// Index third-party dependency sources, tagged external
    pub async fn index_external_libraries(
        &self,
        options: ExternalIndexOptions,
    ) -> Result<ExternalIndexResult, IndexError> {
        let fs = self.fs.clone();
        let root = self.config.root.clone();
        let patterns = self.patterns.clone();
        let supports = Arc::clone(&self.supports);
        let only_imported = options.only_imported;

        let dependencies = tokio::task::spawn_blocking(move || {
            let dependencies = discover_dependencies(&root, &fs, &supports);
            if !only_imported {
                return dependencies;
            }
            let imports = collect_project_imports(&root, &patterns, &fs, &supports);
            filter_imported(dependencies, &imports, &supports)
        })
        .await
        .map_err(IndexError::join)?;

        let indexer = ExternalSymbolIndexer::new(
            self.pipeline(self.config.dependency_concurrency),
            self.fs.clone(),
            Arc::clone(&self.supports),
            self.config.max_files_per_dependency,
        );
        Ok(indexer
            .index_dependencies(&dependencies, &options, &self.shutdown.child_token())
            .await)
    }

    /// Parsed imports of a project file
    pub async fn imports_of(&self, file: &Path) -> Result<Vec<ImportInfo>, IndexError> {
        let file = self.absolute(file);
        let fs = self.fs.clone();
        let root = self.config.root.clone();
        let supports = Arc::clone(&self.supports);
        let imports = tokio::task::spawn_blocking(move || {
            ModuleResolver::new(root, fs, supports, Vec::new()).imports_of(&file)
        })
        .await
        .map_err(IndexError::join)??;
        Ok(imports)
    }

    /// Cancel in-flight operations; the index stays usable for queries
    pub fn dispose(&self) {
        self.shutdown.cancel();
    }
}

/// First symbol named `name`, preferring top-level symbols
fn find_symbol<'a>(symbols: &'a [SymbolEntry], name: &str) -> Option<&'a SymbolEntry> {
    symbols.iter().find(|s| s.name == name).or_else(|| {
        symbols
            .iter()
            .flat_map(SymbolEntry::walk)
            .find(|s| s.name == name)
    })
}
