use crate::cache::error::CacheError;
use crate::cache::{Cache, CacheEntry, Namespace};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Process-local cache. Used in tests and by hosts that do not want anything
/// written to disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(Namespace, String), CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces an entry verbatim, including its `fetched_at`.
    pub fn insert_entry(&self, entry: CacheEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((entry.namespace, entry.key.clone()), entry);
    }
}

impl Cache for MemoryCache {
    fn get_entry(&self, namespace: Namespace, key: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(namespace, key.to_string()))
            .cloned()
    }

    fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.insert_entry(CacheEntry::new(namespace, key, value, ttl));
        Ok(())
    }

    fn invalidate(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(namespace, key.to_string()));
        Ok(())
    }

    fn clear(&self, namespace: Namespace) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(ns, _), _| *ns != namespace);
        Ok(())
    }
}
