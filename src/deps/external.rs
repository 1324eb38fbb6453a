//! Indexing of third-party dependency sources
//!
//! Dependencies are processed one after another; files of a dependency go
//! through the shared [`IndexingPipeline`] with the dependency concurrency
//! bound and are tagged with the dependency name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, instrument, warn};

use crate::deps::{DependencyInfo, Ecosystem, LanguageSupport};
use crate::index::pipeline::{IndexTarget, IndexingPipeline};
use crate::index::progress::{NoopObserver, ProgressObserver};
use crate::io::{FilePatterns, FileSystemTrait};
use crate::log_timing;

/// Directories inside a dependency that never hold its public API
pub const SKIPPED_DEPENDENCY_DIRS: &[&str] = &[
    "test",
    "tests",
    "__tests__",
    "spec",
    "build",
    "docs",
    "examples",
    "benches",
    "node_modules",
    "target",
    ".git",
];

#[derive(Clone, Default)]
pub struct ExternalIndexOptions {
    /// Index at most this many dependencies
    pub max_dependencies: Option<usize>,
    /// Restrict to dependencies imported somewhere in the project
    pub only_imported: bool,
    pub observer: Option<Arc<dyn ProgressObserver>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyError {
    pub dependency: String,
    /// Failing file, `None` when the whole dependency failed
    pub file: Option<PathBuf>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIndexResult {
    /// Dependencies with at least one indexed file
    pub dependency_count: usize,
    pub symbol_count: usize,
    pub indexing_time_ms: u64,
    pub errors: Vec<DependencyError>,
}

/// Keep the dependencies that some project import refers to
pub fn filter_imported<F: FileSystemTrait>(
    dependencies: Vec<DependencyInfo>,
    imports: &BTreeMap<Ecosystem, BTreeSet<String>>,
    supports: &[Box<dyn LanguageSupport<F>>],
) -> Vec<DependencyInfo> {
    dependencies
        .into_iter()
        .filter(|dependency| {
            let Some(support) = supports.iter().find(|s| s.ecosystem() == dependency.ecosystem)
            else {
                return false;
            };
            imports.get(&dependency.ecosystem).is_some_and(|specifiers| {
                specifiers
                    .iter()
                    .any(|specifier| support.matches_dependency(specifier, dependency))
            })
        })
        .collect()
}

pub struct ExternalSymbolIndexer<F: FileSystemTrait> {
    pipeline: IndexingPipeline<F>,
    fs: F,
    supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
    max_files_per_dependency: usize,
}

impl<F: FileSystemTrait> ExternalSymbolIndexer<F> {
    pub fn new(
        pipeline: IndexingPipeline<F>,
        fs: F,
        supports: Arc<Vec<Box<dyn LanguageSupport<F>>>>,
        max_files_per_dependency: usize,
    ) -> Self {
        Self {
            pipeline,
            fs,
            supports,
            max_files_per_dependency: max_files_per_dependency.max(1),
        }
    }

    /// Source files of an installed dependency, capped and sorted
    pub async fn dependency_files(&self, dependency: &DependencyInfo) -> Vec<PathBuf> {
        let Some(location) = dependency.location.clone() else {
            return Vec::new();
        };
        let Some(support) = self
            .supports
            .iter()
            .find(|s| s.ecosystem() == dependency.ecosystem)
        else {
            return Vec::new();
        };

        let fs = self.fs.clone();
        let walked = tokio::task::spawn_blocking(move || {
            let patterns = FilePatterns::new(["**/*"]).and_then(|p| {
                p.with_excludes(
                    SKIPPED_DEPENDENCY_DIRS
                        .iter()
                        .map(|dir| format!("**/{}/**", dir)),
                )
            });
            match patterns {
                Ok(patterns) => fs.expand_patterns(&location, &patterns),
                Err(e) => {
                    warn!("Invalid dependency file pattern: {}", e);
                    Vec::new()
                }
            }
        })
        .await;

        let walked = match walked {
            Ok(files) => files,
            Err(e) => {
                warn!("Enumerating {} failed: {}", dependency.name, e);
                return Vec::new();
            }
        };

        let sources: Vec<PathBuf> = walked
            .into_iter()
            .filter(|path| support.is_dependency_source(path))
            .collect();
        let mut files = support.select_dependency_files(sources);
        files.sort();
        if files.len() > self.max_files_per_dependency {
            debug!(
                "Capping {} at {} of {} files",
                dependency.name,
                self.max_files_per_dependency,
                files.len()
            );
            files.truncate(self.max_files_per_dependency);
        }
        files
    }

    #[instrument(name = "index_dependencies", skip_all, fields(dependencies = dependencies.len()))]
    pub async fn index_dependencies(
        &self,
        dependencies: &[DependencyInfo],
        options: &ExternalIndexOptions,
        cancel: &CancellationToken,
    ) -> ExternalIndexResult {
        let start = Instant::now();
        let mut result = ExternalIndexResult::default();

        let noop = NoopObserver;
        let observer: &dyn ProgressObserver = match &options.observer {
            Some(observer) => &**observer,
            None => &noop,
        };

        let installed = dependencies.iter().filter(|d| d.is_installed());
        debug!(
            "{} of {} dependencies installed",
            installed.clone().count(),
            dependencies.len()
        );
        let selected: Vec<&DependencyInfo> = match options.max_dependencies {
            Some(max) => installed.take(max).collect(),
            None => installed.collect(),
        };

        for dependency in selected {
            if cancel.is_cancelled() {
                info!("Dependency indexing cancelled");
                break;
            }

            let files = self.dependency_files(dependency).await;
            if files.is_empty() {
                result.errors.push(DependencyError {
                    dependency: dependency.name.clone(),
                    file: None,
                    error: "No source files found".to_string(),
                });
                continue;
            }

            debug!("Indexing {} files of {}", files.len(), dependency.name);
            let report = self
                .pipeline
                .run(
                    files,
                    IndexTarget::external(&dependency.name),
                    observer,
                    cancel,
                )
                .await;

            if report.files_indexed > 0 {
                result.dependency_count += 1;
            }
            result.symbol_count += report.total_symbols;
            result
                .errors
                .extend(report.errors.into_iter().map(|e| DependencyError {
                    dependency: dependency.name.clone(),
                    file: Some(e.file),
                    error: e.error,
                }));
        }

        result.indexing_time_ms = start.elapsed().as_millis() as u64;
        log_timing!(Level::DEBUG, "index_dependencies", start.elapsed());
        info!(
            "Indexed {} dependencies ({} symbols, {} errors) in {}ms",
            result.dependency_count,
            result.symbol_count,
            result.errors.len(),
            result.indexing_time_ms
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::{PythonSupport, TypeScriptSupport};
    use crate::index::cache::FilesystemCacheStorage;
    use crate::index::query::{ExternalFilter, SymbolQuery};
    use crate::index::store::SymbolStore;
    use crate::io::file_system::TestFileSystem;
    use crate::provider::testing::TestSymbolProvider;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        provider: Arc<TestSymbolProvider>,
        store: Arc<SymbolStore>,
        indexer: ExternalSymbolIndexer<TestFileSystem>,
    }

    fn fixture(fs: TestFileSystem, max_files: usize) -> Fixture {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(TestSymbolProvider::new());
        let store = Arc::new(SymbolStore::new("/p"));
        let cache = Arc::new(FilesystemCacheStorage::new(temp.path().join("cache")));
        let pipeline = IndexingPipeline::new(provider.clone(), store.clone(), cache, fs.clone())
            .with_concurrency(2);
        let supports: Vec<Box<dyn LanguageSupport<TestFileSystem>>> = vec![
            Box::new(TypeScriptSupport::default()),
            Box::new(PythonSupport::default()),
        ];
        Fixture {
            _temp: temp,
            provider,
            store,
            indexer: ExternalSymbolIndexer::new(pipeline, fs, Arc::new(supports), max_files),
        }
    }

    fn installed(name: &str, ecosystem: Ecosystem, location: &str) -> DependencyInfo {
        let mut dependency = DependencyInfo::new(name, ecosystem);
        dependency.location = Some(PathBuf::from(location));
        dependency
    }

    fn dependency_fs() -> TestFileSystem {
        let fs = TestFileSystem::new();
        let now = SystemTime::now();
        let pkg = "/p/node_modules/neverthrow";
        fs.set_file_content(format!("{pkg}/package.json"), "{}", now);
        fs.set_file_content(format!("{pkg}/dist/index.d.ts"), "", now);
        fs.set_file_content(format!("{pkg}/dist/index.js"), "", now);
        fs.set_file_content(format!("{pkg}/dist/result.d.ts"), "", now);
        fs.set_file_content(format!("{pkg}/tests/result.test.d.ts"), "", now);
        fs.set_file_content(format!("{pkg}/node_modules/inner/index.d.ts"), "", now);
        fs.set_file_content("/p/node_modules/empty/README.md", "", now);
        fs
    }

    #[tokio::test]
    async fn test_dependency_files_prefer_declarations_and_skip_tests() {
        let fixture = fixture(dependency_fs(), 200);
        let dependency = installed(
            "neverthrow",
            Ecosystem::TypeScript,
            "/p/node_modules/neverthrow",
        );

        let files = fixture.indexer.dependency_files(&dependency).await;
        assert!(files.contains(&PathBuf::from("/p/node_modules/neverthrow/dist/index.d.ts")));
        assert!(files.contains(&PathBuf::from("/p/node_modules/neverthrow/dist/result.d.ts")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("/tests/")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("inner")));
        assert!(!files.iter().any(|f| f.extension().unwrap() == "js"));
    }

    #[tokio::test]
    async fn test_max_files_per_dependency() {
        let fixture = fixture(dependency_fs(), 1);
        let dependency = installed(
            "neverthrow",
            Ecosystem::TypeScript,
            "/p/node_modules/neverthrow",
        );
        assert_eq!(fixture.indexer.dependency_files(&dependency).await.len(), 1);
    }

    #[tokio::test]
    async fn test_index_dependencies_tags_symbols() {
        let fixture = fixture(dependency_fs(), 2);
        let dependencies = vec![
            installed(
                "neverthrow",
                Ecosystem::TypeScript,
                "/p/node_modules/neverthrow",
            ),
            installed("empty", Ecosystem::TypeScript, "/p/node_modules/empty"),
            DependencyInfo::new("missing", Ecosystem::TypeScript),
        ];

        let result = fixture
            .indexer
            .index_dependencies(
                &dependencies,
                &ExternalIndexOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.dependency_count, 1);
        assert_eq!(result.symbol_count, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].dependency, "empty");

        let external = fixture
            .store
            .query(&SymbolQuery::new().external(ExternalFilter::Only))
            .await;
        assert_eq!(external.len(), 2);
        assert!(external.iter().all(|s| s.is_external));
        assert!(
            external
                .iter()
                .all(|s| s.source_library.as_deref() == Some("neverthrow"))
        );
        assert!(
            fixture
                .store
                .query(&SymbolQuery::new())
                .await
                .is_empty()
        );
        assert_eq!(fixture.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_max_dependencies_and_failures() {
        let fs = dependency_fs();
        let now = SystemTime::now();
        fs.set_file_content("/venv/requests/__init__.py", "", now);
        fs.set_file_content("/venv/requests/api.py", "", now);
        let fixture = fixture(fs, 200);
        fixture.provider.fail_for(
            Path::new("/venv/requests/api.py"),
            "server crashed",
        );

        let dependencies = vec![
            installed("requests", Ecosystem::Python, "/venv/requests"),
            installed(
                "neverthrow",
                Ecosystem::TypeScript,
                "/p/node_modules/neverthrow",
            ),
        ];
        let options = ExternalIndexOptions {
            max_dependencies: Some(1),
            ..Default::default()
        };
        let result = fixture
            .indexer
            .index_dependencies(&dependencies, &options, &CancellationToken::new())
            .await;

        assert_eq!(result.dependency_count, 1);
        assert_eq!(result.symbol_count, 1);
        assert_eq!(
            result.errors,
            vec![DependencyError {
                dependency: "requests".to_string(),
                file: Some(PathBuf::from("/venv/requests/api.py")),
                error: "Symbol request failed for file:///venv/requests/api.py: server crashed"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn test_filter_imported() {
        let supports: Vec<Box<dyn LanguageSupport<TestFileSystem>>> = vec![
            Box::new(TypeScriptSupport::default()),
            Box::new(PythonSupport::default()),
        ];
        let imports = BTreeMap::from([
            (
                Ecosystem::TypeScript,
                BTreeSet::from(["neverthrow".to_string(), "@scope/pkg/sub".to_string()]),
            ),
            (Ecosystem::Python, BTreeSet::from(["yaml".to_string()])),
        ]);
        let dependencies = vec![
            DependencyInfo::new("neverthrow", Ecosystem::TypeScript),
            DependencyInfo::new("@scope/pkg", Ecosystem::TypeScript),
            DependencyInfo::new("lodash", Ecosystem::TypeScript),
            DependencyInfo::new("requests", Ecosystem::Python),
        ];

        let kept: Vec<String> = filter_imported(dependencies, &imports, &supports)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(kept, vec!["neverthrow", "@scope/pkg"]);
    }
}
