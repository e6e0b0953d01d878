use crate::cache::error::CacheError;
use crate::geocode::error::GeocodeError;
use crate::stations::error::LocateStationError;
use crate::weather_data::error::WeatherDataError;
use std::fmt;
use thiserror::Error;

/// Input the caller has to fix; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("'{0}' is not a five-digit German postal code")]
    PostalCode(String),

    #[error("Coordinate ({latitude}, {longitude}) is out of range")]
    Coordinate { latitude: f64, longitude: f64 },

    #[error("Base temperature must be a finite number, got {0}")]
    BaseTemperature(f64),

    #[error("Invalid period: {0}")]
    Period(String),
}

/// The pipeline stage an [`HddError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Setup,
    Input,
    Geocode,
    StationSearch,
    Observations,
    Calculation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Input => "input",
            Stage::Geocode => "geocode",
            Stage::StationSearch => "station search",
            Stage::Observations => "observations",
            Stage::Calculation => "calculation",
        };
        f.write_str(name)
    }
}

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed postal code, coordinate, period or base temperature.
    InvalidInput,
    /// The geocoder had no match for the postal code.
    GeocodeNotFound,
    /// No station in the catalog satisfies the coverage filter.
    NoStationAvailable,
    /// The station catalog could not be loaded and no cached copy exists.
    CatalogUnavailable,
    /// Neither the recent nor the historical source had data for the station.
    ObservationUnavailable,
    /// A transient network or service failure; retrying later may help.
    UpstreamUnavailable,
    /// The local cache directory could not be set up.
    CacheUnavailable,
}

#[derive(Debug, Error)]
pub enum HddError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    LocateStation(#[from] LocateStationError),

    #[error(transparent)]
    WeatherData(#[from] WeatherDataError),

    #[error("Calculation input rejected")]
    Calculation(#[source] InvalidInput),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to determine cache directory")]
    CacheDirResolution,
}

impl HddError {
    pub fn stage(&self) -> Stage {
        match self {
            HddError::InvalidInput(_) => Stage::Input,
            HddError::Geocode(_) => Stage::Geocode,
            HddError::LocateStation(_) => Stage::StationSearch,
            HddError::WeatherData(_) => Stage::Observations,
            HddError::Calculation(_) => Stage::Calculation,
            HddError::Cache(_) | HddError::CacheDirResolution => Stage::Setup,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HddError::InvalidInput(_) | HddError::Calculation(_) => ErrorKind::InvalidInput,
            HddError::Geocode(GeocodeError::NotFound(_)) => ErrorKind::GeocodeNotFound,
            HddError::Geocode(_) => ErrorKind::UpstreamUnavailable,
            HddError::LocateStation(LocateStationError::NoStationAvailable { .. }) => {
                ErrorKind::NoStationAvailable
            }
            HddError::LocateStation(_) => ErrorKind::CatalogUnavailable,
            HddError::WeatherData(WeatherDataError::ObservationUnavailable { .. }) => {
                ErrorKind::ObservationUnavailable
            }
            HddError::WeatherData(_) => ErrorKind::UpstreamUnavailable,
            HddError::Cache(_) | HddError::CacheDirResolution => ErrorKind::CacheUnavailable,
        }
    }

    /// Whether the same request may succeed later without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UpstreamUnavailable
                | ErrorKind::CatalogUnavailable
                | ErrorKind::ObservationUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_kind() {
        let err = HddError::from(InvalidInput::PostalCode("abc".into()));
        assert_eq!(err.stage(), Stage::Input);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.is_retryable());

        let err = HddError::from(GeocodeError::NotFound("99999".into()));
        assert_eq!(err.stage(), Stage::Geocode);
        assert_eq!(err.kind(), ErrorKind::GeocodeNotFound);
        assert!(!err.is_retryable());

        let err = HddError::Calculation(InvalidInput::BaseTemperature(f64::NAN));
        assert_eq!(err.stage(), Stage::Calculation);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_observation_unavailable_is_distinct_from_upstream() {
        let err = HddError::from(WeatherDataError::ObservationUnavailable {
            station: "00433".into(),
            recent: "not found".into(),
            historical: "not found".into(),
        });
        assert_eq!(err.stage(), Stage::Observations);
        assert_eq!(err.kind(), ErrorKind::ObservationUnavailable);
        assert!(err.to_string().contains("00433"));
    }
}
