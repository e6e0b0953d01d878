//! Recent-then-historical retrieval of a station's daily TMK series.

use crate::retry::{with_retry, RetryPolicy};
use crate::types::observation::TemperatureObservation;
use crate::types::period::DateRange;
use crate::weather_data::archive_index::ArchiveIndex;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::source::ObservationSource;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A data source the fetcher may consult for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceAttempt {
    Recent,
    Historical,
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceAttempt::Recent => f.write_str("recent"),
            SourceAttempt::Historical => f.write_str("historical"),
        }
    }
}

/// Sources in the order they are tried. On a date both deliver, the earlier
/// source's value wins unless it is missing.
pub const SOURCE_PLAN: [SourceAttempt; 2] = [SourceAttempt::Recent, SourceAttempt::Historical];

/// What one source attempt produced.
#[derive(Debug)]
enum AttemptOutcome {
    Data(Vec<TemperatureObservation>),
    Failed(WeatherDataError),
    Skipped,
}

impl AttemptOutcome {
    fn first_date(&self) -> Option<NaiveDate> {
        match self {
            AttemptOutcome::Data(rows) => rows.iter().map(|o| o.date).min(),
            _ => None,
        }
    }

    /// Only an attempt that returned at least one row counts as data.
    fn has_rows(&self) -> bool {
        matches!(self, AttemptOutcome::Data(rows) if !rows.is_empty())
    }

    fn describe(&self) -> String {
        match self {
            AttemptOutcome::Data(rows) if rows.is_empty() => "no rows".to_string(),
            AttemptOutcome::Data(rows) => format!("{} rows", rows.len()),
            AttemptOutcome::Failed(e) => e.to_string(),
            AttemptOutcome::Skipped => "not attempted".to_string(),
        }
    }
}

pub struct ObservationFetcher {
    source: Arc<dyn ObservationSource>,
    archive_index: ArchiveIndex,
    retry: RetryPolicy,
}

impl ObservationFetcher {
    pub fn new(
        source: Arc<dyn ObservationSource>,
        archive_index: ArchiveIndex,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            archive_index,
            retry,
        }
    }

    /// One observation per day of `range`, ordered by date. Days no source
    /// delivered carry an absent TMK.
    ///
    /// # Errors
    ///
    /// [`WeatherDataError::ObservationUnavailable`] when no source produced
    /// a single row for the station, whether it failed or came back empty.
    pub async fn fetch(
        &self,
        station_id: &str,
        range: DateRange,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
        let mut outcomes: Vec<(SourceAttempt, AttemptOutcome)> = Vec::with_capacity(SOURCE_PLAN.len());

        for attempt in SOURCE_PLAN {
            let outcome = if self.is_needed(attempt, &outcomes, &range) {
                match self.run(attempt, station_id, &range).await {
                    Ok(rows) => {
                        info!(
                            "{} source delivered {} rows for station {}",
                            attempt,
                            rows.len(),
                            station_id
                        );
                        AttemptOutcome::Data(rows)
                    }
                    Err(e) => {
                        warn!(
                            "{} source failed for station {}: {}",
                            attempt, station_id, e
                        );
                        AttemptOutcome::Failed(e)
                    }
                }
            } else {
                debug!("Skipping {} source for station {}", attempt, station_id);
                AttemptOutcome::Skipped
            };
            outcomes.push((attempt, outcome));
        }

        if !outcomes.iter().any(|(_, outcome)| outcome.has_rows()) {
            let describe = |wanted: SourceAttempt| {
                outcomes
                    .iter()
                    .find(|(attempt, _)| *attempt == wanted)
                    .map(|(_, outcome)| outcome.describe())
                    .unwrap_or_else(|| "not attempted".to_string())
            };
            return Err(WeatherDataError::ObservationUnavailable {
                station: station_id.to_string(),
                recent: describe(SourceAttempt::Recent),
                historical: describe(SourceAttempt::Historical),
            });
        }

        let merged = merge_by_precedence(outcomes.into_iter().filter_map(|(_, outcome)| {
            match outcome {
                AttemptOutcome::Data(rows) => Some(rows),
                _ => None,
            }
        }));
        Ok(fill_range(station_id, &range, &merged))
    }

    /// Historical data is only needed when recent data is missing or starts
    /// after the requested range does.
    fn is_needed(
        &self,
        attempt: SourceAttempt,
        earlier: &[(SourceAttempt, AttemptOutcome)],
        range: &DateRange,
    ) -> bool {
        match attempt {
            SourceAttempt::Recent => true,
            SourceAttempt::Historical => earlier
                .iter()
                .find(|(a, _)| *a == SourceAttempt::Recent)
                .map(|(_, outcome)| match outcome.first_date() {
                    Some(first) => range.start < first,
                    None => true,
                })
                .unwrap_or(true),
        }
    }

    async fn run(
        &self,
        attempt: SourceAttempt,
        station_id: &str,
        range: &DateRange,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
        match attempt {
            SourceAttempt::Recent => {
                with_retry(self.retry, "Recent observations download", || {
                    self.source.recent(station_id)
                })
                .await
            }
            SourceAttempt::Historical => self.fetch_historical(station_id, range).await,
        }
    }

    /// Downloads every archive segment overlapping `range`. A segment that
    /// fails is logged and skipped as long as another one succeeded.
    async fn fetch_historical(
        &self,
        station_id: &str,
        range: &DateRange,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
        let segments = self
            .archive_index
            .segments_overlapping(station_id, range)
            .await?;

        let mut rows = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for segment in &segments {
            match with_retry(self.retry, "Historical archive download", || {
                self.source.archive_segment(segment)
            })
            .await
            {
                Ok(segment_rows) => {
                    succeeded += 1;
                    rows.extend(segment_rows);
                }
                Err(e) => {
                    warn!("Skipping archive {}: {}", segment.file_name, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(rows),
        }
    }
}

/// Merges per-source rows given in precedence order. A present value from a
/// higher-precedence source always wins; an absent one never hides a present
/// value from a lower-precedence source.
fn merge_by_precedence(
    sources: impl IntoIterator<Item = Vec<TemperatureObservation>>,
) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut merged: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for rows in sources {
        for observation in rows {
            let slot = merged.entry(observation.date).or_insert(None);
            if slot.is_none() {
                *slot = observation.tmk;
            }
        }
    }
    merged
}

fn fill_range(
    station_id: &str,
    range: &DateRange,
    merged: &BTreeMap<NaiveDate, Option<f64>>,
) -> Vec<TemperatureObservation> {
    range
        .days()
        .map(|date| TemperatureObservation {
            date,
            station_id: station_id.to_string(),
            tmk: merged.get(&date).copied().flatten(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather_data::source::ArchiveSegment;
    use crate::cache::memory_cache::MemoryCache;
    use crate::geocode::tests::fake_reqwest_error;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, tmk: Option<f64>) -> TemperatureObservation {
        TemperatureObservation {
            date,
            station_id: "00433".into(),
            tmk,
        }
    }

    enum RecentReply {
        Rows(Vec<TemperatureObservation>),
        NotFound,
        Unavailable,
    }

    /// Archive segments map to their rows, or to `None` when the download
    /// fails. `listing: None` makes the listing itself fail.
    struct ScriptedSource {
        recent: RecentReply,
        listing: Option<Vec<(ArchiveSegment, Option<Vec<TemperatureObservation>>)>>,
        recent_calls: AtomicUsize,
        segment_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(
            recent: RecentReply,
            listing: Option<Vec<(ArchiveSegment, Option<Vec<TemperatureObservation>>)>>,
        ) -> Self {
            Self {
                recent,
                listing,
                recent_calls: AtomicUsize::new(0),
                segment_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObservationSource for ScriptedSource {
        async fn recent(
            &self,
            station_id: &str,
        ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
            self.recent_calls.fetch_add(1, Ordering::SeqCst);
            let url = format!("recent/tageswerte_KL_{station_id}_akt.zip");
            match &self.recent {
                RecentReply::Rows(rows) => Ok(rows.clone()),
                RecentReply::NotFound => Err(WeatherDataError::NotFound { url }),
                RecentReply::Unavailable => Err(WeatherDataError::HttpStatus {
                    url,
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    source: fake_reqwest_error(),
                }),
            }
        }

        async fn archive_listing(&self) -> Result<Vec<ArchiveSegment>, WeatherDataError> {
            match &self.listing {
                Some(segments) => Ok(segments.iter().map(|(s, _)| s.clone()).collect()),
                None => Err(WeatherDataError::EmptyListing {
                    url: "historical/".into(),
                }),
            }
        }

        async fn archive_segment(
            &self,
            segment: &ArchiveSegment,
        ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
            self.segment_calls.fetch_add(1, Ordering::SeqCst);
            self.listing
                .iter()
                .flatten()
                .find(|(s, _)| s == segment)
                .and_then(|(_, rows)| rows.clone())
                .ok_or_else(|| WeatherDataError::NotFound {
                    url: segment.file_name.clone(),
                })
        }
    }

    fn segment(from: NaiveDate, to: NaiveDate) -> ArchiveSegment {
        ArchiveSegment {
            file_name: format!(
                "tageswerte_KL_00433_{}_{}_hist.zip",
                from.format("%Y%m%d"),
                to.format("%Y%m%d")
            ),
            station_id: "00433".into(),
            coverage: DateRange::new(from, to).unwrap(),
        }
    }

    fn fetcher(source: Arc<ScriptedSource>, retry: RetryPolicy) -> ObservationFetcher {
        let index = ArchiveIndex::new(
            Arc::clone(&source) as Arc<dyn ObservationSource>,
            Arc::new(MemoryCache::new()),
            Duration::from_secs(3600),
            retry,
        );
        ObservationFetcher::new(source, index, retry)
    }

    fn tmks(observations: &[TemperatureObservation]) -> Vec<Option<f64>> {
        observations.iter().map(|o| o.tmk).collect()
    }

    #[tokio::test]
    async fn test_missing_recent_file_falls_back_to_archive() {
        let archive = segment(date(1948, 1, 1), date(2024, 12, 31));
        let source = Arc::new(ScriptedSource::new(
            RecentReply::NotFound,
            Some(vec![(
                archive,
                Some(vec![obs(date(2024, 1, 1), Some(2.0)), obs(date(2024, 1, 2), Some(-1.5))]),
            )]),
        ));
        let fetcher = fetcher(Arc::clone(&source), RetryPolicy::none());
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 2)).unwrap();

        let observations = fetcher.fetch("00433", range).await.unwrap();
        assert_eq!(tmks(&observations), [Some(2.0), Some(-1.5)]);
        assert_eq!(source.recent_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_recent_failure_is_retried_once_then_archive_used() {
        let archive = segment(date(1948, 1, 1), date(2024, 12, 31));
        let source = Arc::new(ScriptedSource::new(
            RecentReply::Unavailable,
            Some(vec![(archive, Some(vec![obs(date(2024, 3, 1), Some(6.0))]))]),
        ));
        let retry = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let fetcher = fetcher(Arc::clone(&source), retry);

        let observations = fetcher
            .fetch("00433", DateRange::single_day(date(2024, 3, 1)))
            .await
            .unwrap();
        assert_eq!(tmks(&observations), [Some(6.0)]);
        assert_eq!(source.recent_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_archive_segment_is_skipped_when_another_delivers() {
        let older = segment(date(1948, 1, 1), date(2023, 12, 31));
        let newer = segment(date(2024, 1, 1), date(2024, 12, 31));
        let source = Arc::new(ScriptedSource::new(
            RecentReply::NotFound,
            Some(vec![
                (
                    older,
                    Some(vec![obs(date(2023, 12, 30), Some(1.0)), obs(date(2023, 12, 31), Some(0.5))]),
                ),
                (newer, None),
            ]),
        ));
        let fetcher = fetcher(Arc::clone(&source), RetryPolicy::none());
        let range = DateRange::new(date(2023, 12, 30), date(2024, 1, 2)).unwrap();

        let observations = fetcher.fetch("00433", range).await.unwrap();
        assert_eq!(tmks(&observations), [Some(1.0), Some(0.5), None, None]);
        assert_eq!(source.segment_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_recent_and_failing_listing_is_unavailable() {
        let source = Arc::new(ScriptedSource::new(RecentReply::Rows(vec![]), None));
        let fetcher = fetcher(source, RetryPolicy::none());
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();

        let err = fetcher.fetch("00433", range).await.unwrap_err();
        match err {
            WeatherDataError::ObservationUnavailable {
                station, recent, ..
            } => {
                assert_eq!(station, "00433");
                assert_eq!(recent, "no rows");
            }
            other => panic!("expected ObservationUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_prefers_present_earlier_values() {
        let recent = vec![
            obs(date(2024, 1, 2), Some(5.0)),
            obs(date(2024, 1, 3), None),
        ];
        let historical = vec![
            obs(date(2024, 1, 1), Some(1.0)),
            obs(date(2024, 1, 2), Some(2.0)),
            obs(date(2024, 1, 3), Some(3.0)),
        ];
        let merged = merge_by_precedence([recent, historical]);
        assert_eq!(merged[&date(2024, 1, 1)], Some(1.0));
        assert_eq!(merged[&date(2024, 1, 2)], Some(5.0));
        assert_eq!(merged[&date(2024, 1, 3)], Some(3.0));
    }

    #[test]
    fn test_fill_range_marks_gaps_absent() {
        let mut merged = BTreeMap::new();
        merged.insert(date(2024, 1, 2), Some(4.0));
        merged.insert(date(2023, 12, 31), Some(9.0));
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();

        let filled = fill_range("00433", &range, &merged);
        let values: Vec<_> = filled.iter().map(|o| (o.date, o.tmk)).collect();
        assert_eq!(
            values,
            [
                (date(2024, 1, 1), None),
                (date(2024, 1, 2), Some(4.0)),
                (date(2024, 1, 3), None)
            ]
        );
    }
}
