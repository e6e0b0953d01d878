use crate::types::observation::TemperatureObservation;
use crate::types::period::DateRange;
use crate::weather_data::error::WeatherDataError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One historical archive file and the days it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveSegment {
    pub file_name: String,
    pub station_id: String,
    pub coverage: DateRange,
}

/// Upstream provider of daily mean temperatures.
///
/// Implementations return [`WeatherDataError::NotFound`] when a file simply
/// does not exist, so callers can tell that apart from a service outage.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// The rolling recent window for a station.
    async fn recent(
        &self,
        station_id: &str,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError>;

    /// Every historical segment of every station.
    async fn archive_listing(&self) -> Result<Vec<ArchiveSegment>, WeatherDataError>;

    async fn archive_segment(
        &self,
        segment: &ArchiveSegment,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError>;
}
