//! The main entry point: postal code and base temperature in, daily heating
//! degree days out.

use crate::cache::file_cache::FileCache;
use crate::cache::{Cache, Namespace};
use crate::calculator::heating_degree_days;
use crate::config::HddConfig;
use crate::error::{HddError, InvalidInput};
use crate::geocode::nominatim::NominatimClient;
use crate::geocode::{Geocoder, GeocodingService};
use crate::stations::catalog::StationCatalog;
use crate::stations::filter::StationFilter;
use crate::stations::StationSource;
use crate::types::coordinate::Coordinate;
use crate::types::period::DateRange;
use crate::types::postal_code::PostalCode;
use crate::types::series::HddSeries;
use crate::types::station::Station;
use crate::utils::get_cache_dir;
use crate::weather_data::archive_index::ArchiveIndex;
use crate::weather_data::dwd::DwdClient;
use crate::weather_data::fetcher::ObservationFetcher;
use crate::weather_data::source::ObservationSource;
use bon::bon;
use chrono::{NaiveDate, Utc};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// The heating-degree-day client.
///
/// It owns the cache and the three upstream adapters (geocoder, station
/// catalog, observation source). All of them are shared by every request
/// made through the same client, so keep one instance around.
///
/// # Examples
///
/// ```no_run
/// # use heizgradtage::{HeatingDegreeDays, HddError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), HddError> {
/// let client = HeatingDegreeDays::new()?;
/// let series = client
///     .compute_hdd()
///     .postal_code("10115")
///     .base_temperature(15.0)
///     .call()
///     .await?;
/// println!("{} HDD over {} days", series.total(), series.records.len());
/// # Ok(())
/// # }
/// ```
pub struct HeatingDegreeDays {
    config: HddConfig,
    cache: Arc<dyn Cache>,
    geocoder: Geocoder,
    catalog: StationCatalog,
    fetcher: ObservationFetcher,
}

#[bon]
impl HeatingDegreeDays {
    /// Client with default settings, caching under the platform cache
    /// directory (e.g. `~/.cache/heizgradtage_cache` on Linux).
    ///
    /// # Errors
    ///
    /// [`HddError::CacheDirResolution`] if there is no platform cache
    /// directory, [`HddError::Cache`] if it cannot be created.
    pub fn new() -> Result<Self, HddError> {
        Self::with_cache_folder(get_cache_dir()?)
    }

    pub fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, HddError> {
        Self::with_config(cache_folder, HddConfig::default())
    }

    /// Client talking to the servers named in `config`.
    pub fn with_config(cache_folder: PathBuf, config: HddConfig) -> Result<Self, HddError> {
        let cache = Arc::new(FileCache::new(&cache_folder)?);
        info!("Using cache directory {:?}", cache.root());
        let geocoding = Arc::new(
            NominatimClient::new(
                &config.nominatim_url,
                &config.country_code,
                config.http_timeout,
                &config.user_agent,
            )?
            .with_min_interval(config.geocode_min_interval),
        );
        let dwd = Arc::new(DwdClient::new(
            &config.dwd_base_url,
            config.http_timeout,
            &config.user_agent,
        )?);
        Ok(Self::with_components(
            config,
            cache,
            geocoding,
            Arc::clone(&dwd) as Arc<dyn StationSource>,
            dwd,
        ))
    }

    /// Client over caller-supplied adapters, e.g. in-memory fakes.
    pub fn with_components(
        config: HddConfig,
        cache: Arc<dyn Cache>,
        geocoding: Arc<dyn GeocodingService>,
        stations: Arc<dyn StationSource>,
        observations: Arc<dyn ObservationSource>,
    ) -> Self {
        let geocoder = Geocoder::new(
            geocoding,
            Arc::clone(&cache),
            config.ttl(Namespace::Geocode),
            config.retry,
        );
        let catalog = StationCatalog::new(
            stations,
            Arc::clone(&cache),
            config.ttl(Namespace::Stations),
            config.retry,
            config.coverage,
            config.active_tolerance_days,
        );
        let archive_index = ArchiveIndex::new(
            Arc::clone(&observations),
            Arc::clone(&cache),
            config.ttl(Namespace::HistoricalIndex),
            config.retry,
        );
        let fetcher = ObservationFetcher::new(observations, archive_index, config.retry);
        Self {
            config,
            cache,
            geocoder,
            catalog,
            fetcher,
        }
    }

    pub fn config(&self) -> &HddConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Drops every cached geocode, catalog and archive index entry.
    pub fn clear_cache(&self) -> Result<(), HddError> {
        for namespace in Namespace::ALL {
            self.cache.clear(namespace)?;
        }
        Ok(())
    }

    /// Resolves a postal code to its coordinate (cached).
    pub async fn locate(&self, postal_code: &str) -> Result<Coordinate, HddError> {
        let postal_code = PostalCode::new(postal_code)?;
        Ok(self.geocoder.resolve(&postal_code).await?)
    }

    /// Daily heating degree days for the station nearest to a postal code.
    ///
    /// This method uses a builder pattern.
    ///
    /// * `.postal_code(&str)`: **Required.** Five-digit German postal code.
    /// * `.base_temperature(f64)`: **Required.** Tbase in °C.
    /// * `.period(DateRange)`: Optional. Defaults to the
    ///   [`default_lookback_days`](HddConfig::default_lookback_days) ending yesterday.
    ///
    /// The series has one record per day of the period. Days the station did
    /// not report are `None`, never zero.
    ///
    /// # Errors
    ///
    /// Every error carries the pipeline stage it came from
    /// ([`HddError::stage`]) and a coarse [`kind`](HddError::kind).
    #[builder]
    pub async fn compute_hdd(
        &self,
        postal_code: &str,
        base_temperature: f64,
        period: Option<DateRange>,
    ) -> Result<HddSeries, HddError> {
        let postal_code = PostalCode::new(postal_code)?;
        if !base_temperature.is_finite() {
            return Err(HddError::Calculation(InvalidInput::BaseTemperature(
                base_temperature,
            )));
        }
        let today = Utc::now().date_naive();
        let range = match period {
            Some(range) if range.start > today => {
                return Err(InvalidInput::Period(format!("{} lies in the future", range)).into())
            }
            Some(range) => range,
            None => default_period(today, self.config.default_lookback_days).ok_or_else(|| {
                InvalidInput::Period(format!(
                    "cannot look back {} days from {}",
                    self.config.default_lookback_days, today
                ))
            })?,
        };

        let coordinate = self.geocoder.resolve(&postal_code).await?;
        let nearest = self.catalog.nearest_for_period(coordinate, period).await?;
        let observations = self.fetcher.fetch(&nearest.station.id, range).await?;
        let records =
            heating_degree_days(&observations, base_temperature).map_err(HddError::Calculation)?;

        info!(
            "Computed {} HDD records for {} from station {} ({:.1} km)",
            records.len(),
            postal_code,
            nearest.station.id,
            nearest.distance_km
        );
        Ok(HddSeries {
            postal_code,
            coordinate,
            station: nearest.station,
            distance_km: nearest.distance_km,
            catalog_stale: nearest.catalog_stale,
            base_temperature,
            period: range,
            records,
        })
    }

    /// Stations closest to a coordinate, nearest first, with their distance
    /// in km.
    ///
    /// * `.location(Coordinate)`: **Required.**
    /// * `.period(DateRange)`: Optional. Only stations whose records match the
    ///   configured coverage policy for this period.
    /// * `.station_limit(usize)`: Optional. Defaults to `5`.
    #[builder]
    pub async fn find_stations(
        &self,
        location: Coordinate,
        period: Option<DateRange>,
        station_limit: Option<usize>,
    ) -> Result<Vec<(Station, f64)>, HddError> {
        let filter = period
            .map(|period| self.config.coverage.filter_for(period))
            .unwrap_or(StationFilter::Any);
        let snapshot = self.catalog.load().await?;
        Ok(snapshot
            .locator
            .nearest_n(location, &filter, station_limit.unwrap_or(5))
            .into_iter()
            .map(|(station, distance_km)| (station.clone(), distance_km))
            .collect())
    }
}

/// `lookback_days` days ending the day before `today`.
pub(crate) fn default_period(today: NaiveDate, lookback_days: u32) -> Option<DateRange> {
    let end = today.pred_opt()?;
    let start = end.checked_sub_signed(chrono::Duration::days(
        i64::from(lookback_days.max(1)) - 1,
    ))?;
    DateRange::new(start, end)
}
