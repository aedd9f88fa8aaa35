//! On-disk tile cache.
//!
//! Each entry is one file, `<directory>/<key>.png`. Writes go to a hidden
//! temporary sibling first and are renamed into place, so concurrent readers
//! see either the old entry, no entry, or the complete new one. Blocking file
//! I/O runs on tokio's blocking pool.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::traits::{validate_key, BoxFuture, Cache, ServiceCacheError};

/// File extension of cache entries.
const ENTRY_EXTENSION: &str = "png";

/// Suffix of in-progress writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Summary of the cache directory contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache entries.
    pub entries: u64,
    /// Total size of all entries in bytes.
    pub bytes: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entries, {} bytes", self.entries, self.bytes)
    }
}

/// File-per-entry cache rooted at a directory.
pub struct DiskCache {
    directory: PathBuf,
    write_seq: AtomicU64,
}

impl DiskCache {
    /// Creates a cache rooted at `directory`. The directory is created on
    /// first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_seq: AtomicU64::new(0),
        }
    }

    /// Returns the cache directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the entry for `key`.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, ServiceCacheError> {
        validate_key(key)?;
        Ok(self
            .directory
            .join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        self.directory.join(format!(
            ".{}.{}.{}{}",
            key,
            std::process::id(),
            seq,
            TEMP_SUFFIX
        ))
    }

    /// Counts entries and their total size.
    ///
    /// A missing directory is an empty cache.
    pub fn stats(&self) -> io::Result<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.entries()? {
            stats.entries += 1;
            stats.bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }

    /// Deletes every entry and any abandoned temporary file.
    ///
    /// Returns what was removed. Files that are not cache entries are left
    /// untouched.
    pub fn clear(&self) -> io::Result<CacheStats> {
        let mut removed = CacheStats::default();
        for path in self.entries()? {
            let len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed.entries += 1;
                    removed.bytes += len;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        for path in self.list(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))? {
            let _ = fs::remove_file(path);
        }

        debug!(
            directory = %self.directory.display(),
            entries = removed.entries,
            bytes = removed.bytes,
            "Cache cleared"
        );
        Ok(removed)
    }

    fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let suffix = format!(".{}", ENTRY_EXTENSION);
        self.list(|name| !name.starts_with('.') && name.ends_with(&suffix))
    }

    fn list(&self, keep: impl Fn(&str) -> bool) -> io::Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.directory) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_str().is_some_and(&keep) {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ServiceCacheError>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceCacheError::SpawnError(e.to_string()))?
        .map_err(ServiceCacheError::from)
}

/// Writes `data` to `temp` and renames it over `path`.
fn write_atomic(path: &Path, temp: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = (|| {
        let mut file = fs::File::create(temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(temp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(temp);
    }
    result
}

impl Cache for DiskCache {
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let paths = self
            .entry_path(key)
            .map(|path| (path, self.temp_path(key)));
        let key = key.to_string();

        Box::pin(async move {
            let (path, temp) = paths?;
            let size = value.len();
            blocking(move || write_atomic(&path, &temp, &value)).await?;
            trace!(key = %key, size, "Cache entry written");
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let path = self.entry_path(key);

        Box::pin(async move {
            let path = path?;
            blocking(move || match fs::read(&path) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            })
            .await
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let path = self.entry_path(key);

        Box::pin(async move {
            let path = path?;
            blocking(move || match fs::remove_file(&path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            })
            .await
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let path = self.entry_path(key);

        Box::pin(async move {
            let path = path?;
            blocking(move || Ok(path.is_file())).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_delete() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path().join("tiles"));

        assert_eq!(cache.get("4d_20160102034000_0_0").await.unwrap(), None);
        assert!(!cache.contains("4d_20160102034000_0_0").await.unwrap());

        cache
            .set("4d_20160102034000_0_0", vec![1, 2, 3])
            .await
            .unwrap();

        assert!(cache.contains("4d_20160102034000_0_0").await.unwrap());
        assert_eq!(
            cache.get("4d_20160102034000_0_0").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert!(temp
            .path()
            .join("tiles/4d_20160102034000_0_0.png")
            .is_file());

        assert!(cache.delete("4d_20160102034000_0_0").await.unwrap());
        assert!(!cache.delete("4d_20160102034000_0_0").await.unwrap());
        assert_eq!(cache.get("4d_20160102034000_0_0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());

        cache.set("key", vec![1]).await.unwrap();
        cache.set("key", vec![2, 2]).await.unwrap();

        assert_eq!(cache.get("key").await.unwrap(), Some(vec![2, 2]));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());

        let err = cache.set("../escape", vec![1]).await.unwrap_err();
        assert!(matches!(err, ServiceCacheError::InvalidKey(_)));
        assert!(cache.get("a/b").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_distinct_writes() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(DiskCache::new(temp.path().join("nested/dir")));

        let mut handles = Vec::new();
        for i in 0..32u8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.set(&format!("tile_{}", i), vec![i; 64]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..32u8 {
            assert_eq!(
                cache.get(&format!("tile_{}", i)).await.unwrap(),
                Some(vec![i; 64])
            );
        }
        assert_eq!(cache.stats().unwrap().entries, 32);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());

        cache.set("a", vec![0; 10]).await.unwrap();
        cache.set("b", vec![0; 20]).await.unwrap();
        fs::write(temp.path().join("notes.txt"), b"keep me").unwrap();
        fs::write(temp.path().join(".c.1.1.tmp"), b"partial").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats, CacheStats { entries: 2, bytes: 30 });

        let removed = cache.clear().unwrap();
        assert_eq!(removed, stats);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert!(temp.path().join("notes.txt").exists());
        assert!(!temp.path().join(".c.1.1.tmp").exists());
    }

    #[test]
    fn test_stats_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path().join("does-not-exist"));
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert_eq!(cache.clear().unwrap(), CacheStats::default());
    }
}
