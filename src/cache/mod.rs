//! Namespaced, TTL-aware key/value cache shared by every pipeline component.
//!
//! A cache read never touches the network. Anything that cannot be read back
//! (missing file, unreadable file, undecodable payload) is reported as absent,
//! so the pipeline behaves exactly as on a cold cache.

pub mod error;
pub mod file_cache;
pub mod memory_cache;

use crate::cache::error::CacheError;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub(crate) const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// The three key spaces of the cache. Each has its own default lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Postal code -> coordinate. Effectively static.
    Geocode,
    /// The full DWD station catalog under a single key.
    Stations,
    /// Station id -> list of historical archive segments.
    HistoricalIndex,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::Geocode,
        Namespace::Stations,
        Namespace::HistoricalIndex,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Geocode => "geocode",
            Namespace::Stations => "stations",
            Namespace::HistoricalIndex => "historical-index",
        }
    }

    pub fn default_ttl(&self) -> Duration {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            Namespace::Geocode => Duration::from_secs(180 * DAY),
            Namespace::Stations => Duration::from_secs(7 * DAY),
            Namespace::HistoricalIndex => Duration::from_secs(7 * DAY),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A stored value together with when it was fetched and how long it stays fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub namespace: Namespace,
    pub key: String,
    pub value: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(namespace: Namespace, key: &str, value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            namespace,
            key: key.to_string(),
            value,
            fetched_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        age.num_seconds() < self.ttl_secs as i64
    }
}

/// Storage behind the pipeline's cache. Implementations must tolerate
/// concurrent readers and writers; the last write for a key wins.
pub trait Cache: Send + Sync {
    /// The latest entry for the key, regardless of age.
    fn get_entry(&self, namespace: Namespace, key: &str) -> Option<CacheEntry>;

    fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    fn invalidate(&self, namespace: Namespace, key: &str) -> Result<(), CacheError>;

    fn clear(&self, namespace: Namespace) -> Result<(), CacheError>;

    /// The value for the key if it has not outlived its TTL.
    fn get(&self, namespace: Namespace, key: &str) -> Option<Vec<u8>> {
        self.get_entry(namespace, key)
            .filter(|entry| entry.is_fresh(Utc::now()))
            .map(|entry| entry.value)
    }
}

/// A decoded cache value and whether it is still within its TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Serde-typed access on top of any [`Cache`].
pub trait CacheExt: Cache {
    fn get_typed<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        decode_value(namespace, key, &self.get(namespace, key)?)
    }

    /// The decoded value regardless of age, with its freshness.
    fn get_cached_typed<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Option<CachedValue<T>> {
        let entry = self.get_entry(namespace, key)?;
        let fresh = entry.is_fresh(Utc::now());
        decode_value(namespace, key, &entry.value).map(|value| CachedValue {
            value,
            fetched_at: entry.fetched_at,
            fresh,
        })
    }

    fn put_typed<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = bincode::serde::encode_to_vec(value, BINCODE_CONFIG)
            .map_err(|e| CacheError::CacheEncode(Box::new(e)))?;
        self.put(namespace, key, bytes, ttl)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

fn decode_value<T: DeserializeOwned>(namespace: Namespace, key: &str, bytes: &[u8]) -> Option<T> {
    match bincode::serde::decode_from_slice::<T, _>(bytes, BINCODE_CONFIG) {
        Ok((value, _)) => Some(value),
        Err(e) => {
            warn!(
                "Ignoring undecodable cache value {}/{}: {}",
                namespace, key, e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_cache::MemoryCache;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_entry_freshness() {
        let mut entry = CacheEntry::new(
            Namespace::Geocode,
            "10115",
            vec![1, 2, 3],
            Duration::from_secs(60),
        );
        assert!(entry.is_fresh(Utc::now()));
        entry.fetched_at = Utc::now() - ChronoDuration::seconds(61);
        assert!(!entry.is_fresh(Utc::now()));
    }

    #[test]
    fn test_typed_roundtrip_and_garbage() {
        let cache = MemoryCache::new();
        cache
            .put_typed(
                Namespace::Geocode,
                "10115",
                &(52.53, 13.38),
                Duration::from_secs(60),
            )
            .unwrap();
        assert_eq!(
            cache.get_typed::<(f64, f64)>(Namespace::Geocode, "10115"),
            Some((52.53, 13.38))
        );

        cache
            .put(
                Namespace::Geocode,
                "broken",
                vec![0xff],
                Duration::from_secs(60),
            )
            .unwrap();
        assert_eq!(
            cache.get_typed::<(f64, f64)>(Namespace::Geocode, "broken"),
            None
        );
    }

    #[test]
    fn test_expired_value_only_visible_as_stale() {
        let cache = MemoryCache::new();
        cache
            .put_typed(Namespace::Stations, "all", &7u32, Duration::ZERO)
            .unwrap();
        assert_eq!(cache.get_typed::<u32>(Namespace::Stations, "all"), None);
        let cached = cache
            .get_cached_typed::<u32>(Namespace::Stations, "all")
            .unwrap();
        assert_eq!(cached.value, 7);
        assert!(!cached.fresh);
    }
}
