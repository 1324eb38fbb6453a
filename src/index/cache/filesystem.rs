//! Filesystem-backed cache storage
//!
//! Layout: one JSON document per indexed file under
//! `<root>/.symindex/cache/<sha256(path)>.json`, plus a `.gitignore` that
//! keeps the directory out of version control. Writes go to a unique
//! temporary file first and are renamed over the final name. Temporaries
//! orphaned by an interrupted write are swept on first access.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::index::cache::{
    CACHE_FORMAT_VERSION, CacheEntry, CacheError, CacheFileInfo, CacheStorage,
};
use crate::index::diff::content_hash;

const ENTRY_EXTENSION: &str = "json";
const GITIGNORE_CONTENT: &str = "*\n";
const TEMP_MARKER: &str = ".tmp.";

#[derive(serde::Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Debug)]
pub struct FilesystemCacheStorage {
    dir: PathBuf,
    swept: OnceCell<()>,
}

impl FilesystemCacheStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            swept: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for `path`
    pub fn entry_path(&self, path: &Path) -> PathBuf {
        let key = content_hash(path.to_string_lossy().as_bytes());
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    async fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        // Ignore the whole hidden directory, not just the entries
        let ignore_dir = self.dir.parent().unwrap_or(&self.dir);
        let gitignore = ignore_dir.join(".gitignore");
        if !fs::try_exists(&gitignore).await.unwrap_or(false) {
            fs::write(&gitignore, GITIGNORE_CONTENT)
                .await
                .map_err(|e| CacheError::io(&gitignore, e))?;
            debug!("Initialized cache directory {}", self.dir.display());
        }
        self.sweep_once().await;
        Ok(())
    }

    /// Delete leftover `<hash>.tmp.<uuid>` files, once per storage instance
    ///
    /// Runs before this instance writes any temporary file of its own.
    async fn sweep_once(&self) {
        self.swept
            .get_or_init(|| async {
                let mut reader = match fs::read_dir(&self.dir).await {
                    Ok(reader) => reader,
                    Err(_) => return,
                };
                let mut removed = 0usize;
                while let Ok(Some(entry)) = reader.next_entry().await {
                    if !entry.file_name().to_string_lossy().contains(TEMP_MARKER) {
                        continue;
                    }
                    let path = entry.path();
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!("Cannot remove stale cache file {}: {}", path.display(), e),
                    }
                }
                if removed > 0 {
                    debug!(
                        "Removed {} stale temporary files from {}",
                        removed,
                        self.dir.display()
                    );
                }
            })
            .await;
    }

    /// Read and decode one entry file; `None` for any kind of miss
    async fn read_entry<T: DeserializeOwned>(&self, file: &Path) -> Option<T> {
        let bytes = match fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read cache entry {}: {}", file.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<VersionProbe>(&bytes) {
            Ok(probe) if probe.version == CACHE_FORMAT_VERSION => {}
            Ok(probe) => {
                warn!(
                    "Ignoring cache entry {}: {}",
                    file.display(),
                    CacheError::IncompatibleVersion {
                        found: probe.version,
                        expected: CACHE_FORMAT_VERSION,
                    }
                );
                return None;
            }
            Err(e) => {
                warn!("{}", CacheError::corrupted(file, e.to_string()));
                return None;
            }
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}", CacheError::corrupted(file, e.to_string()));
                None
            }
        }
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        self.sweep_once().await;
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl CacheStorage for FilesystemCacheStorage {
    async fn get_file_info(&self, path: &Path) -> Result<Option<CacheFileInfo>, CacheError> {
        let info: Option<CacheFileInfo> = self.read_entry(&self.entry_path(path)).await;
        Ok(info.filter(|info| info.path == path))
    }

    async fn get(&self, path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let entry: Option<CacheEntry> = self.read_entry(&self.entry_path(path)).await;
        Ok(entry.filter(|entry| entry.path == path))
    }

    async fn get_all_files(&self) -> Result<Vec<CacheFileInfo>, CacheError> {
        let mut infos = Vec::new();
        for file in self.entry_files().await? {
            if let Some(info) = self.read_entry::<CacheFileInfo>(&file).await {
                infos.push(info);
            }
        }
        Ok(infos)
    }

    async fn get_all_entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        for file in self.entry_files().await? {
            if let Some(entry) = self.read_entry::<CacheEntry>(&file).await {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.ensure_dir().await?;

        let target = self.entry_path(&entry.path);
        let temp = target.with_extension(format!("tmp.{}", Uuid::new_v4()));
        let json = serde_json::to_vec(entry)?;

        fs::write(&temp, &json)
            .await
            .map_err(|e| CacheError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io(&target, e));
        }

        trace!(
            "Cached {} symbols for {} in {}",
            entry.symbols.len(),
            entry.path.display(),
            target.display()
        );
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<bool, CacheError> {
        let target = self.entry_path(path);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&target, e)),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        }
        debug!("Cleared cache directory {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::diff::ModificationMarker;
    use crate::provider::testing::function_symbols;
    use tempfile::TempDir;

    fn storage(temp: &TempDir) -> FilesystemCacheStorage {
        FilesystemCacheStorage::new(temp.path().join(".symindex").join("cache"))
    }

    fn entry(path: &str, count: usize) -> CacheEntry {
        CacheEntry::new(
            path,
            ModificationMarker::Timestamp(1000),
            function_symbols(Path::new(path), count),
        )
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        let original = entry("/p/src/a.ts", 3);

        cache.put(&original).await.unwrap();

        assert_eq!(cache.get(Path::new("/p/src/a.ts")).await.unwrap(), Some(original));
        let info = cache
            .get_file_info(Path::new("/p/src/a.ts"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.marker, ModificationMarker::Timestamp(1000));
        assert!(cache.get(Path::new("/p/src/missing.ts")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_layout_uses_hashed_names_and_gitignore() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        cache.put(&entry("/p/src/a.ts", 1)).await.unwrap();

        let expected = cache.entry_path(Path::new("/p/src/a.ts"));
        let name = expected.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(expected.exists());

        let gitignore = temp.path().join(".symindex").join(".gitignore");
        assert_eq!(std::fs::read_to_string(gitignore).unwrap(), "*\n");

        // No temporary files are left behind
        let leftovers: Vec<_> = std::fs::read_dir(cache.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(TEMP_MARKER))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_and_foreign_version_entries_are_misses() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        cache.put(&entry("/p/good.ts", 1)).await.unwrap();
        cache.put(&entry("/p/bad.ts", 1)).await.unwrap();
        cache.put(&entry("/p/old.ts", 1)).await.unwrap();

        std::fs::write(cache.entry_path(Path::new("/p/bad.ts")), "{ not json").unwrap();
        let mut old = entry("/p/old.ts", 1);
        old.version = CACHE_FORMAT_VERSION + 1;
        std::fs::write(
            cache.entry_path(Path::new("/p/old.ts")),
            serde_json::to_vec(&old).unwrap(),
        )
        .unwrap();

        assert!(cache.get(Path::new("/p/bad.ts")).await.unwrap().is_none());
        assert!(cache.get(Path::new("/p/old.ts")).await.unwrap().is_none());

        let all = cache.get_all_files().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].path, PathBuf::from("/p/good.ts"));
        assert_eq!(cache.get_all_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        cache.put(&entry("/p/a.ts", 1)).await.unwrap();
        cache.put(&entry("/p/b.ts", 1)).await.unwrap();

        assert!(cache.remove(Path::new("/p/a.ts")).await.unwrap());
        assert!(!cache.remove(Path::new("/p/a.ts")).await.unwrap());
        assert_eq!(cache.get_all_files().await.unwrap().len(), 1);

        cache.clear().await.unwrap();
        assert!(cache.get_all_files().await.unwrap().is_empty());
        assert!(!cache.dir().exists());

        // Usable again after clear
        cache.put(&entry("/p/c.ts", 1)).await.unwrap();
        assert_eq!(cache.get_all_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_cache() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        assert!(cache.get_all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_temp_files_are_swept() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".symindex").join("cache");
        std::fs::create_dir_all(&dir).unwrap();
        let stale = dir.join(format!("{}.tmp.{}", "0".repeat(64), Uuid::new_v4()));
        std::fs::write(&stale, b"{\"version\":").unwrap();

        let cache = FilesystemCacheStorage::new(&dir);
        assert!(cache.get_all_entries().await.unwrap().is_empty());
        assert!(!stale.exists());

        // Later writes by the same instance are unaffected
        cache.put(&entry("/p/src/a.ts", 1)).await.unwrap();
        assert_eq!(cache.get_all_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_external_entries_keep_source_library() {
        let temp = TempDir::new().unwrap();
        let cache = storage(&temp);
        cache
            .put(&entry("/p/node_modules/zod/index.d.ts", 2).with_source_library("zod"))
            .await
            .unwrap();

        let info = &cache.get_all_files().await.unwrap()[0];
        assert_eq!(info.source_library.as_deref(), Some("zod"));
    }
}
