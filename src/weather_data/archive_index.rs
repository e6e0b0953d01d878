//! Station id -> historical archive segments.
//!
//! The DWD historical directory lists every archive of every station. It is
//! downloaded at most once per TTL and process; the segments of each station
//! asked about are written to the `historical-index` cache namespace so a
//! restarted process does not need the listing again.

use crate::cache::{Cache, CacheExt, Namespace};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::period::DateRange;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::source::{ArchiveSegment, ObservationSource};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

type Listing = HashMap<String, Vec<ArchiveSegment>>;

pub struct ArchiveIndex {
    source: Arc<dyn ObservationSource>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    retry: RetryPolicy,
    listing: Mutex<Option<(Arc<Listing>, Instant)>>,
}

impl ArchiveIndex {
    pub fn new(
        source: Arc<dyn ObservationSource>,
        cache: Arc<dyn Cache>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            retry,
            listing: Mutex::new(None),
        }
    }

    /// All segments of a station, oldest first. An empty list means the
    /// station has no historical archive.
    pub async fn segments_for(
        &self,
        station_id: &str,
    ) -> Result<Vec<ArchiveSegment>, WeatherDataError> {
        if let Some(segments) = self
            .cache
            .get_typed::<Vec<ArchiveSegment>>(Namespace::HistoricalIndex, station_id)
        {
            info!("Cache hit for historical index of station {}", station_id);
            return Ok(segments);
        }

        let listing = self.listing().await?;
        let segments = listing.get(station_id).cloned().unwrap_or_default();
        if let Err(e) =
            self.cache
                .put_typed(Namespace::HistoricalIndex, station_id, &segments, self.ttl)
        {
            warn!(
                "Failed to cache historical index of station {}: {}",
                station_id, e
            );
        }
        Ok(segments)
    }

    /// The segments of a station that contain at least one day of `range`.
    pub async fn segments_overlapping(
        &self,
        station_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ArchiveSegment>, WeatherDataError> {
        let segments = self.segments_for(station_id).await?;
        if segments.is_empty() {
            return Err(WeatherDataError::NoArchiveSegments {
                station: station_id.to_string(),
            });
        }
        Ok(segments
            .into_iter()
            .filter(|segment| segment.coverage.overlaps(range))
            .collect())
    }

    async fn listing(&self) -> Result<Arc<Listing>, WeatherDataError> {
        // Held across the download so concurrent misses share one request.
        let mut guard = self.listing.lock().await;
        if let Some((listing, loaded_at)) = guard.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(listing));
            }
        }

        let segments = with_retry(self.retry, "Historical listing download", || {
            self.source.archive_listing()
        })
        .await?;

        let mut listing = Listing::new();
        for segment in segments {
            listing
                .entry(segment.station_id.clone())
                .or_default()
                .push(segment);
        }
        for station_segments in listing.values_mut() {
            station_segments.sort_by_key(|s| s.coverage.start);
        }
        info!("Indexed historical archives of {} stations", listing.len());

        let listing = Arc::new(listing);
        *guard = Some((Arc::clone(&listing), Instant::now()));
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_cache::MemoryCache;
    use crate::types::observation::TemperatureObservation;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ListingOnly {
        segments: Vec<ArchiveSegment>,
        listing_calls: AtomicUsize,
    }

    #[async_trait]
    impl ObservationSource for ListingOnly {
        async fn recent(&self, _: &str) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
            Ok(vec![])
        }

        async fn archive_listing(&self) -> Result<Vec<ArchiveSegment>, WeatherDataError> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.segments.clone())
        }

        async fn archive_segment(
            &self,
            _: &ArchiveSegment,
        ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
            Ok(vec![])
        }
    }

    fn segment(station: &str, from: (i32, u32, u32), to: (i32, u32, u32)) -> ArchiveSegment {
        let from = NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap();
        let to = NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap();
        ArchiveSegment {
            file_name: format!(
                "tageswerte_KL_{}_{}_{}_hist.zip",
                station,
                from.format("%Y%m%d"),
                to.format("%Y%m%d")
            ),
            station_id: station.to_string(),
            coverage: DateRange::new(from, to).unwrap(),
        }
    }

    fn index(source: Arc<ListingOnly>, cache: Arc<MemoryCache>) -> ArchiveIndex {
        ArchiveIndex::new(
            source,
            cache,
            Namespace::HistoricalIndex.default_ttl(),
            RetryPolicy::none(),
        )
    }

    #[tokio::test]
    async fn test_listing_is_fetched_once_and_shards_are_cached() {
        let source = Arc::new(ListingOnly {
            segments: vec![
                segment("00433", (2000, 1, 1), (2023, 12, 31)),
                segment("00433", (1948, 1, 1), (1999, 12, 31)),
                segment("00001", (1937, 1, 1), (1986, 6, 30)),
            ],
            listing_calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MemoryCache::new());
        let index_a = index(Arc::clone(&source), Arc::clone(&cache));

        let segments = index_a.segments_for("00433").await.unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].coverage.start < segments[1].coverage.start);
        assert_eq!(index_a.segments_for("00001").await.unwrap().len(), 1);
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);

        // A second index over the same cache answers from the shard.
        let index_b = index(Arc::clone(&source), cache);
        assert_eq!(index_b.segments_for("00433").await.unwrap().len(), 2);
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_segments() {
        let source = Arc::new(ListingOnly {
            segments: vec![
                segment("00433", (1948, 1, 1), (1999, 12, 31)),
                segment("00433", (2000, 1, 1), (2023, 12, 31)),
            ],
            listing_calls: AtomicUsize::new(0),
        });
        let index = index(source, Arc::new(MemoryCache::new()));
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2010, 1, 31).unwrap(),
        )
        .unwrap();

        let segments = index.segments_overlapping("00433", &range).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].coverage.start.to_string(), "2000-01-01");

        let err = index.segments_overlapping("99999", &range).await.unwrap_err();
        assert!(matches!(err, WeatherDataError::NoArchiveSegments { .. }));
    }
}
