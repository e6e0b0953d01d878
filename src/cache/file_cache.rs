use crate::cache::error::CacheError;
use crate::cache::{Cache, CacheEntry, Namespace, BINCODE_CONFIG};
use log::{debug, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Disk-backed cache: one directory per [`Namespace`], one bincode file per key.
///
/// Writes go to a temporary file in the namespace directory and are renamed
/// into place, so a concurrent reader sees either the old or the new entry.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Opens (and creates if necessary) a cache rooted at `root`.
    pub fn new(root: &Path) -> Result<Self, CacheError> {
        for namespace in Namespace::ALL {
            let dir = root.join(namespace.dir_name());
            std::fs::create_dir_all(&dir).map_err(|e| CacheError::CacheDirCreation(dir, e))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.bin", file_stem_for_key(key)))
    }
}

/// Maps an arbitrary key to a file-name-safe stem. Bytes outside
/// `[A-Za-z0-9_-]` are percent-encoded, so distinct keys keep distinct files.
fn file_stem_for_key(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    if stem.is_empty() {
        stem.push('%');
    }
    stem
}

impl Cache for FileCache {
    fn get_entry(&self, namespace: Namespace, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(namespace, key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache file {:?}, treating as miss: {}", path, e);
                return None;
            }
        };
        let entry = match bincode::serde::decode_from_slice::<CacheEntry, _>(&bytes, BINCODE_CONFIG)
        {
            Ok((entry, _)) => entry,
            Err(e) => {
                warn!("Corrupt cache file {:?}, treating as miss: {}", path, e);
                return None;
            }
        };
        if entry.namespace != namespace || entry.key != key {
            warn!(
                "Cache file {:?} holds {}/{} instead of {}/{}",
                path, entry.namespace, entry.key, namespace, key
            );
            return None;
        }
        debug!("Cache hit for {}/{}", namespace, key);
        Some(entry)
    }

    fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let dir = self.namespace_dir(namespace);
        std::fs::create_dir_all(&dir)
            .map_err(|e| CacheError::CacheDirCreation(dir.clone(), e))?;
        let path = self.entry_path(namespace, key);

        let entry = CacheEntry::new(namespace, key, value, ttl);
        let bytes = bincode::serde::encode_to_vec(&entry, BINCODE_CONFIG)
            .map_err(|e| CacheError::CacheEncode(Box::new(e)))?;

        let mut temp_file =
            NamedTempFile::new_in(&dir).map_err(|e| CacheError::CacheWrite(path.clone(), e))?;
        temp_file
            .write_all(&bytes)
            .map_err(|e| CacheError::CacheWrite(path.clone(), e))?;
        temp_file
            .flush()
            .map_err(|e| CacheError::CacheWrite(path.clone(), e))?;
        temp_file
            .persist(&path)
            .map_err(|e| CacheError::CacheWrite(path.clone(), e.error))?;
        debug!("Cached {}/{} ({} bytes)", namespace, key, bytes.len());
        Ok(())
    }

    fn invalidate(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(namespace, key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::CacheDeletion(path, e)),
        }
    }

    fn clear(&self, namespace: Namespace) -> Result<(), CacheError> {
        let dir = self.namespace_dir(namespace);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::CacheDeletion(dir, e)),
        }
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::CacheDirCreation(dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheExt;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_put_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache
            .put(Namespace::Geocode, "10115", b"berlin".to_vec(), HOUR)
            .unwrap();

        let reopened = FileCache::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get(Namespace::Geocode, "10115"),
            Some(b"berlin".to_vec())
        );
        assert_eq!(reopened.get(Namespace::Stations, "10115"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache
            .put_typed(Namespace::HistoricalIndex, "00433", &1u8, HOUR)
            .unwrap();
        cache
            .put_typed(Namespace::HistoricalIndex, "00433", &2u8, HOUR)
            .unwrap();
        assert_eq!(
            cache.get_typed::<u8>(Namespace::HistoricalIndex, "00433"),
            Some(2)
        );
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache
            .put(Namespace::Stations, "all", vec![1, 2, 3], HOUR)
            .unwrap();
        let path = cache.entry_path(Namespace::Stations, "all");
        std::fs::write(&path, b"definitely not bincode").unwrap();

        assert_eq!(cache.get(Namespace::Stations, "all"), None);
        assert_eq!(cache.get_entry(Namespace::Stations, "all"), None);
    }

    #[test]
    fn test_keys_with_unsafe_characters_stay_distinct() {
        assert_eq!(file_stem_for_key("00433"), "00433");
        assert_ne!(file_stem_for_key("a/b"), file_stem_for_key("a_b"));
        assert_ne!(file_stem_for_key("a/b"), file_stem_for_key("a%2Fb"));
        assert!(!file_stem_for_key("../etc").contains('/'));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache
            .put(Namespace::Geocode, "10115", vec![1], HOUR)
            .unwrap();
        cache
            .put(Namespace::Geocode, "80331", vec![2], HOUR)
            .unwrap();

        cache.invalidate(Namespace::Geocode, "10115").unwrap();
        cache.invalidate(Namespace::Geocode, "10115").unwrap();
        assert_eq!(cache.get(Namespace::Geocode, "10115"), None);
        assert!(cache.get(Namespace::Geocode, "80331").is_some());

        cache.clear(Namespace::Geocode).unwrap();
        assert_eq!(cache.get(Namespace::Geocode, "80331"), None);
        cache
            .put(Namespace::Geocode, "80331", vec![3], HOUR)
            .unwrap();
        assert_eq!(cache.get(Namespace::Geocode, "80331"), Some(vec![3]));
    }

    #[test]
    fn test_concurrent_writers_leave_a_readable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(dir.path()).unwrap());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .put_typed(Namespace::Geocode, "shared", &i, HOUR)
                        .unwrap();
                    cache.get_typed::<u32>(Namespace::Geocode, "shared")
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }
        let last = cache.get_typed::<u32>(Namespace::Geocode, "shared").unwrap();
        assert!(last < 8);
    }
}
