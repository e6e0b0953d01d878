//! Postal code → coordinate resolution, cached in the `geocode` namespace.

pub mod error;
pub mod nominatim;

use crate::cache::{Cache, CacheExt, Namespace};
use crate::geocode::error::GeocodeError;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::coordinate::Coordinate;
use crate::types::postal_code::PostalCode;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// One match returned by a geocoding service.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    pub coordinate: Coordinate,
    pub display_name: String,
}

/// An external service that turns a German postal code into ranked candidates.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Candidates ordered best-first; an empty list means "no match".
    async fn search_postal_code(
        &self,
        postal_code: &PostalCode,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError>;
}

/// Resolves postal codes through the cache first and the service second.
pub struct Geocoder {
    service: Arc<dyn GeocodingService>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    retry: RetryPolicy,
}

impl Geocoder {
    pub fn new(
        service: Arc<dyn GeocodingService>,
        cache: Arc<dyn Cache>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            cache,
            ttl,
            retry,
        }
    }

    /// Returns the coordinate of the first candidate for `postal_code`.
    ///
    /// # Errors
    ///
    /// [`GeocodeError::NotFound`] when the service has no match; the other
    /// variants describe a service that could not be reached or understood
    /// after the retry policy was exhausted.
    pub async fn resolve(&self, postal_code: &PostalCode) -> Result<Coordinate, GeocodeError> {
        if let Some(coordinate) = self
            .cache
            .get_typed::<Coordinate>(Namespace::Geocode, postal_code.as_str())
        {
            info!("Cache hit for geocode of {}", postal_code);
            return Ok(coordinate);
        }

        let candidates = with_retry(self.retry, "Geocoding request", || {
            self.service.search_postal_code(postal_code)
        })
        .await?;

        let first = candidates
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(postal_code.to_string()))?;
        info!(
            "Resolved {} to ({}, {}) [{}]",
            postal_code,
            first.coordinate.latitude,
            first.coordinate.longitude,
            first.display_name
        );

        if let Err(e) = self.cache.put_typed(
            Namespace::Geocode,
            postal_code.as_str(),
            &first.coordinate,
            self.ttl,
        ) {
            warn!("Failed to cache geocode of {}: {}", postal_code, e);
        }
        Ok(first.coordinate)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::memory_cache::MemoryCache;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned geocoder counting how often it is asked.
    #[derive(Default)]
    pub(crate) struct FakeGeocoder {
        pub(crate) known: HashMap<String, Coordinate>,
        pub(crate) fail_times: AtomicUsize,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeGeocoder {
        pub(crate) fn with(postal_code: &str, latitude: f64, longitude: f64) -> Self {
            let mut known = HashMap::new();
            known.insert(
                postal_code.to_string(),
                Coordinate::new(latitude, longitude).unwrap(),
            );
            Self {
                known,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GeocodingService for FakeGeocoder {
        async fn search_postal_code(
            &self,
            postal_code: &PostalCode,
        ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining_failures = self.fail_times.load(Ordering::SeqCst);
            if remaining_failures > 0 {
                self.fail_times.store(remaining_failures - 1, Ordering::SeqCst);
                return Err(GeocodeError::HttpStatus {
                    url: "fake".into(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    source: fake_reqwest_error(),
                });
            }
            Ok(self
                .known
                .get(postal_code.as_str())
                .map(|coordinate| GeocodeCandidate {
                    coordinate: *coordinate,
                    display_name: format!("{postal_code}, Deutschland"),
                })
                .into_iter()
                .collect())
        }
    }

    /// A real `reqwest::Error` without any network: an unparsable URL.
    pub(crate) fn fake_reqwest_error() -> reqwest::Error {
        reqwest::Client::new().get("not a url").build().unwrap_err()
    }

    fn geocoder(service: Arc<FakeGeocoder>, cache: Arc<MemoryCache>) -> Geocoder {
        Geocoder::new(
            service,
            cache,
            Namespace::Geocode.default_ttl(),
            RetryPolicy {
                max_retries: 1,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_warm_cache_returns_identical_coordinate_without_network() {
        let service = Arc::new(FakeGeocoder::with("10115", 52.5323, 13.3846));
        let cache = Arc::new(MemoryCache::new());
        let geocoder = geocoder(Arc::clone(&service), Arc::clone(&cache));
        let postal_code = PostalCode::new("10115").unwrap();

        let first = geocoder.resolve(&postal_code).await.unwrap();
        let second = geocoder.resolve(&postal_code).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_postal_code_is_not_found_and_not_cached() {
        let service = Arc::new(FakeGeocoder::default());
        let cache = Arc::new(MemoryCache::new());
        let geocoder = geocoder(Arc::clone(&service), Arc::clone(&cache));

        let err = geocoder
            .resolve(&PostalCode::new("99999").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(code) if code == "99999"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_single_transient_failure_is_retried() {
        let service = Arc::new(FakeGeocoder::with("80331", 48.137, 11.575));
        service.fail_times.store(1, Ordering::SeqCst);
        let geocoder = geocoder(Arc::clone(&service), Arc::new(MemoryCache::new()));

        let coordinate = geocoder
            .resolve(&PostalCode::new("80331").unwrap())
            .await
            .unwrap();
        assert_eq!(coordinate.latitude, 48.137);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let service = Arc::new(FakeGeocoder::with("80331", 48.137, 11.575));
        service.fail_times.store(5, Ordering::SeqCst);
        let geocoder = geocoder(Arc::clone(&service), Arc::new(MemoryCache::new()));

        let err = geocoder
            .resolve(&PostalCode::new("80331").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::HttpStatus { .. }));
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
