use crate::cache::Namespace;
use crate::geocode::nominatim::NOMINATIM_URL;
use crate::retry::RetryPolicy;
use crate::stations::filter::CoveragePolicy;
use crate::weather_data::dwd::DWD_KL_DAILY_URL;
use bon::Builder;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = concat!("heizgradtage/", env!("CARGO_PKG_VERSION"));

/// Settings for [`HeatingDegreeDays`](crate::HeatingDegreeDays).
///
/// `HddConfig::default()` points at the public DWD and Nominatim servers.
///
/// # Examples
///
/// ```
/// use heizgradtage::{CoveragePolicy, HddConfig};
/// use std::time::Duration;
///
/// let config = HddConfig::builder()
///     .coverage(CoveragePolicy::Full)
///     .http_timeout(Duration::from_secs(10))
///     .user_agent("my-energy-app/1.0 (ops@example.com)")
///     .build();
/// assert_eq!(config.country_code, "de");
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct HddConfig {
    /// Base of the DWD daily `KL` product tree (containing `recent/` and `historical/`).
    #[builder(into, default = DWD_KL_DAILY_URL.to_string())]
    pub dwd_base_url: String,
    #[builder(into, default = NOMINATIM_URL.to_string())]
    pub nominatim_url: String,
    #[builder(into, default = "de".to_string())]
    pub country_code: String,
    /// Sent with every request. Nominatim rejects anonymous clients.
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    #[builder(default = Duration::from_secs(25))]
    pub http_timeout: Duration,
    /// Minimum spacing between two geocoding requests.
    #[builder(default = Duration::from_millis(1100))]
    pub geocode_min_interval: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default = Namespace::Geocode.default_ttl())]
    pub geocode_ttl: Duration,
    #[builder(default = Namespace::Stations.default_ttl())]
    pub stations_ttl: Duration,
    #[builder(default = Namespace::HistoricalIndex.default_ttl())]
    pub historical_index_ttl: Duration,
    #[builder(default)]
    pub coverage: CoveragePolicy,
    /// Without a requested period, stations whose records end at most this
    /// many days before the newest record in the catalog count as active.
    #[builder(default = 30)]
    pub active_tolerance_days: u32,
    /// Length of the default period, which ends yesterday.
    #[builder(default = 365)]
    pub default_lookback_days: u32,
}

impl Default for HddConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HddConfig {
    pub fn ttl(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Geocode => self.geocode_ttl,
            Namespace::Stations => self.stations_ttl,
            Namespace::HistoricalIndex => self.historical_index_ttl,
        }
    }
}
