use crate::cache::{Cache, CacheExt, CachedValue, Namespace};
use crate::retry::{with_retry, RetryPolicy};
use crate::stations::error::LocateStationError;
use crate::stations::filter::{CoveragePolicy, StationFilter};
use crate::stations::locate_station::StationLocator;
use crate::stations::StationSource;
use crate::types::coordinate::Coordinate;
use crate::types::period::DateRange;
use crate::types::station::Station;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const CATALOG_CACHE_KEY: &str = "dwd-kl-daily";
/// How long a stale snapshot is served before the source is tried again.
const STALE_RECHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// One loaded station catalog.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub locator: StationLocator,
    pub fetched_at: DateTime<Utc>,
    /// Set when the source could not be reached and an expired cached copy
    /// is being served instead.
    pub stale: bool,
}

/// The station chosen for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestStation {
    pub station: Station,
    pub distance_km: f64,
    pub filter: StationFilter,
    pub catalog_stale: bool,
}

struct LoadedSnapshot {
    snapshot: Arc<CatalogSnapshot>,
    loaded_at: Instant,
}

/// The DWD daily-climate station list, cached under the `stations`
/// namespace and kept in memory between requests.
pub struct StationCatalog {
    source: Arc<dyn StationSource>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    retry: RetryPolicy,
    coverage: CoveragePolicy,
    active_tolerance: chrono::Duration,
    current: RwLock<Option<LoadedSnapshot>>,
}

impl StationCatalog {
    pub fn new(
        source: Arc<dyn StationSource>,
        cache: Arc<dyn Cache>,
        ttl: Duration,
        retry: RetryPolicy,
        coverage: CoveragePolicy,
        active_tolerance_days: u32,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            retry,
            coverage,
            active_tolerance: chrono::Duration::days(active_tolerance_days as i64),
            current: RwLock::new(None),
        }
    }

    fn is_usable(&self, loaded: &LoadedSnapshot) -> bool {
        if loaded.snapshot.stale {
            return loaded.loaded_at.elapsed() < STALE_RECHECK_INTERVAL;
        }
        let age = Utc::now().signed_duration_since(loaded.snapshot.fetched_at);
        age.num_seconds() < self.ttl.as_secs() as i64
    }

    /// Returns the current snapshot, refreshing it when its TTL has run out.
    ///
    /// # Errors
    ///
    /// [`LocateStationError::CatalogUnavailable`] when the source fails and
    /// no cached copy exists at all.
    pub async fn load(&self) -> Result<Arc<CatalogSnapshot>, LocateStationError> {
        {
            let current = self.current.read().await;
            if let Some(loaded) = current.as_ref().filter(|l| self.is_usable(l)) {
                return Ok(Arc::clone(&loaded.snapshot));
            }
        }

        let mut current = self.current.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(loaded) = current.as_ref().filter(|l| self.is_usable(l)) {
            return Ok(Arc::clone(&loaded.snapshot));
        }

        let snapshot = Arc::new(self.refresh().await?);
        *current = Some(LoadedSnapshot {
            snapshot: Arc::clone(&snapshot),
            loaded_at: Instant::now(),
        });
        Ok(snapshot)
    }

    async fn refresh(&self) -> Result<CatalogSnapshot, LocateStationError> {
        let cached: Option<CachedValue<Vec<Station>>> = self
            .cache
            .get_cached_typed(Namespace::Stations, CATALOG_CACHE_KEY);

        if let Some(cached) = cached.as_ref().filter(|c| c.fresh) {
            info!(
                "Cache hit for station catalog ({} stations, fetched {})",
                cached.value.len(),
                cached.fetched_at
            );
            return Ok(Self::snapshot(cached.value.clone(), cached.fetched_at, false));
        }

        match with_retry(self.retry, "Station catalog download", || {
            self.source.fetch_stations()
        })
        .await
        {
            Ok(stations) => {
                info!("Loaded {} stations from source", stations.len());
                if let Err(e) = self.cache.put_typed(
                    Namespace::Stations,
                    CATALOG_CACHE_KEY,
                    &stations,
                    self.ttl,
                ) {
                    warn!("Failed to cache station catalog: {}", e);
                }
                Ok(Self::snapshot(stations, Utc::now(), false))
            }
            Err(e) => match cached {
                Some(cached) => {
                    warn!(
                        "Station catalog refresh failed ({}); using stale copy from {}",
                        e, cached.fetched_at
                    );
                    Ok(Self::snapshot(cached.value, cached.fetched_at, true))
                }
                None => Err(LocateStationError::CatalogUnavailable(Box::new(e))),
            },
        }
    }

    fn snapshot(stations: Vec<Station>, fetched_at: DateTime<Utc>, stale: bool) -> CatalogSnapshot {
        let locator = StationLocator::new(stations);
        debug!("Indexed {} stations in the locator", locator.len());
        CatalogSnapshot {
            locator,
            fetched_at,
            stale,
        }
    }

    /// Nearest station accepted by `filter`.
    pub async fn nearest(
        &self,
        coordinate: Coordinate,
        filter: &StationFilter,
    ) -> Result<NearestStation, LocateStationError> {
        self.nearest_with_filters(coordinate, std::slice::from_ref(filter))
            .await
    }

    /// Nearest station for a requested period, using the configured coverage
    /// policy. Without a period, stations still reporting (within the active
    /// tolerance of the newest record in the catalog) are preferred, and any
    /// station with records is the fallback.
    pub async fn nearest_for_period(
        &self,
        coordinate: Coordinate,
        period: Option<DateRange>,
    ) -> Result<NearestStation, LocateStationError> {
        let filters = match period {
            Some(period) => vec![self.coverage.filter_for(period)],
            None => {
                let snapshot = self.load().await?;
                let mut filters = Vec::with_capacity(2);
                if let Some(latest) = snapshot.locator.latest_observation_end() {
                    filters.push(StationFilter::ActiveSince(latest - self.active_tolerance));
                }
                filters.push(StationFilter::Any);
                filters
            }
        };
        self.nearest_with_filters(coordinate, &filters).await
    }

    /// Tries each filter in order and returns the first hit.
    async fn nearest_with_filters(
        &self,
        coordinate: Coordinate,
        filters: &[StationFilter],
    ) -> Result<NearestStation, LocateStationError> {
        let snapshot = self.load().await?;
        if snapshot.stale {
            warn!(
                "Searching a stale station catalog (fetched {})",
                snapshot.fetched_at
            );
        }
        for filter in filters {
            if let Some((station, distance_km)) = snapshot.locator.nearest(coordinate, filter) {
                info!(
                    "Nearest station to ({}, {}) with {}: {} {} at {:.1} km",
                    coordinate.latitude,
                    coordinate.longitude,
                    filter,
                    station.id,
                    station.name,
                    distance_km
                );
                return Ok(NearestStation {
                    station: station.clone(),
                    distance_km,
                    filter: *filter,
                    catalog_stale: snapshot.stale,
                });
            }
        }
        Err(LocateStationError::NoStationAvailable {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            filter: filters
                .last()
                .map(ToString::to_string)
                .unwrap_or_else(|| "no filter".to_string()),
        })
    }
}
