mod cache;
mod calculator;
mod config;
mod error;
mod geocode;
mod heizgradtage;
mod retry;
mod stations;
mod types;
mod utils;
mod weather_data;

pub use error::{ErrorKind, HddError, InvalidInput, Stage};
pub use heizgradtage::*;

pub use cache::error::CacheError;
pub use cache::file_cache::FileCache;
pub use cache::memory_cache::MemoryCache;
pub use cache::{Cache, CacheEntry, CacheExt, CachedValue, Namespace};

pub use calculator::heating_degree_days;
pub use config::HddConfig;
pub use retry::RetryPolicy;

pub use geocode::error::GeocodeError;
pub use geocode::nominatim::{NominatimClient, NOMINATIM_URL};
pub use geocode::{GeocodeCandidate, Geocoder, GeocodingService};

pub use stations::catalog::{CatalogSnapshot, NearestStation, StationCatalog};
pub use stations::error::LocateStationError;
pub use stations::filter::{CoveragePolicy, StationFilter};
pub use stations::locate_station::StationLocator;
pub use stations::StationSource;

pub use types::coordinate::Coordinate;
pub use types::observation::{HddRecord, TemperatureObservation};
pub use types::period::{DatePeriod, DateRange, Month, Year};
pub use types::postal_code::PostalCode;
pub use types::series::HddSeries;
pub use types::station::Station;

pub use weather_data::dwd::{DwdClient, DWD_KL_DAILY_URL};
pub use weather_data::error::WeatherDataError;
pub use weather_data::fetcher::{ObservationFetcher, SourceAttempt, SOURCE_PLAN};
pub use weather_data::source::{ArchiveSegment, ObservationSource};
pub use weather_data::archive_index::ArchiveIndex;
