use crate::types::coordinate::Coordinate;
use crate::types::observation::HddRecord;
use crate::types::period::DateRange;
use crate::types::postal_code::PostalCode;
use crate::types::station::Station;
use serde::{Deserialize, Serialize};

/// The answer to one heating-degree-day request: the daily series plus
/// everything that was resolved on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HddSeries {
    pub postal_code: PostalCode,
    pub coordinate: Coordinate,
    pub station: Station,
    /// Great-circle distance between `coordinate` and the station.
    pub distance_km: f64,
    /// The station was picked from an expired catalog because the DWD
    /// server could not be reached.
    pub catalog_stale: bool,
    pub base_temperature: f64,
    pub period: DateRange,
    /// One record per day of `period`, in date order.
    pub records: Vec<HddRecord>,
}

impl HddSeries {
    /// Sum over the days with data. Missing days contribute nothing, so
    /// compare with [`missing_days`](Self::missing_days) before relying on it.
    pub fn total(&self) -> f64 {
        self.records.iter().filter_map(|r| r.hdd).sum()
    }

    pub fn missing_days(&self) -> usize {
        self.records.iter().filter(|r| r.is_missing()).count()
    }

    pub fn present_days(&self) -> usize {
        self.records.len() - self.missing_days()
    }
}
