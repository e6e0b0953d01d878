use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of daily-mean air temperature (TMK) for a station.
///
/// `tmk` is `None` when the station reported the day as missing (`-999`) or
/// when neither data source had a row for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureObservation {
    pub date: NaiveDate,
    pub station_id: String,
    pub tmk: Option<f64>,
}

/// Heating degree days for a single day. `hdd` is `None` where the
/// underlying temperature is missing; it is never silently zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HddRecord {
    pub date: NaiveDate,
    pub hdd: Option<f64>,
}

impl HddRecord {
    pub fn is_missing(&self) -> bool {
        self.hdd.is_none()
    }
}
