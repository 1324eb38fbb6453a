//! One `ProjectIndex` per project root

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::deps::normalize_path;
use crate::index::error::IndexError;
use crate::index::project_index::ProjectIndex;
use crate::io::{FileSystemTrait, RealFileSystem};
use crate::provider::SymbolProvider;

/// Registry of open indexes keyed by canonical absolute root
pub struct IndexRegistry<F: FileSystemTrait = RealFileSystem> {
    fs: F,
    indexes: Mutex<HashMap<PathBuf, Arc<ProjectIndex<F>>>>,
}

impl Default for IndexRegistry<RealFileSystem> {
    fn default() -> Self {
        Self::new(RealFileSystem)
    }
}

impl<F: FileSystemTrait> IndexRegistry<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            indexes: Mutex::new(HashMap::new()),
        }
    }

    /// Canonical form of a root; falls back to a lexical normalization when
    /// the path cannot be resolved on disk
    async fn key(root: &Path) -> PathBuf {
        match tokio::fs::canonicalize(root).await {
            Ok(canonical) => canonical,
            Err(_) => normalize_path(root),
        }
    }

    /// Existing index for `config.root`, or a freshly opened one
    pub async fn get_or_create(
        &self,
        mut config: IndexConfig,
        provider: Arc<dyn SymbolProvider>,
    ) -> Result<Arc<ProjectIndex<F>>, IndexError> {
        let key = Self::key(&config.root).await;
        let mut indexes = self.indexes.lock().await;
        if let Some(index) = indexes.get(&key) {
            return Ok(Arc::clone(index));
        }

        config.root = key.clone();
        let index = Arc::new(ProjectIndex::open_with(config, provider, self.fs.clone()).await?);
        info!("Opened index for {}", key.display());
        indexes.insert(key, Arc::clone(&index));
        Ok(index)
    }

    pub async fn get(&self, root: &Path) -> Option<Arc<ProjectIndex<F>>> {
        let key = Self::key(root).await;
        self.indexes.lock().await.get(&key).cloned()
    }

    /// Remove and dispose the index of `root`; returns false when none was open
    pub async fn dispose(&self, root: &Path) -> bool {
        let key = Self::key(root).await;
        match self.indexes.lock().await.remove(&key) {
            Some(index) => {
                index.dispose();
                debug!("Disposed index for {}", key.display());
                true
            }
            None => false,
        }
    }

    pub async fn dispose_all(&self) {
        let mut indexes = self.indexes.lock().await;
        for (root, index) in indexes.drain() {
            index.dispose();
            debug!("Disposed index for {}", root.display());
        }
    }

    pub async fn len(&self) -> usize {
        self.indexes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indexes.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfigBuilder;
    use crate::provider::testing::TestSymbolProvider;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/main.py"), "def main(): pass\n").unwrap();
        temp
    }

    fn config(root: &Path) -> IndexConfig {
        IndexConfigBuilder::new(root).build().unwrap()
    }

    #[tokio::test]
    async fn test_same_root_shares_one_index() {
        let temp = project();
        let registry: IndexRegistry = IndexRegistry::default();
        let provider: Arc<dyn SymbolProvider> = Arc::new(TestSymbolProvider::new());

        let first = registry
            .get_or_create(config(temp.path()), provider.clone())
            .await
            .unwrap();
        // A non-canonical spelling of the same root
        let dotted = temp.path().join("src").join("..");
        let second = registry
            .get_or_create(config(&dotted), provider)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(temp.path()).await.is_some());
    }

    #[tokio::test]
    async fn test_dispose() {
        let (one, two) = (project(), project());
        let registry: IndexRegistry = IndexRegistry::default();
        let provider: Arc<dyn SymbolProvider> = Arc::new(TestSymbolProvider::new());
        registry
            .get_or_create(config(one.path()), provider.clone())
            .await
            .unwrap();
        registry
            .get_or_create(config(two.path()), provider)
            .await
            .unwrap();

        assert!(registry.dispose(one.path()).await);
        assert!(!registry.dispose(one.path()).await);
        assert!(registry.get(one.path()).await.is_none());
        assert_eq!(registry.len().await, 1);

        registry.dispose_all().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_root_is_rejected() {
        let registry: IndexRegistry = IndexRegistry::default();
        let result = registry
            .get_or_create(
                config(Path::new("/definitely/not/a/project")),
                Arc::new(TestSymbolProvider::new()),
            )
            .await;
        assert!(matches!(result, Err(IndexError::InvalidRoot { .. })));
        assert!(registry.is_empty().await);
    }
}
