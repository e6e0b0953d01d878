//! Defines the DWD daily-climate station record and the `rstar` glue needed to
//! index stations spatially.

use crate::types::coordinate::Coordinate;
use crate::types::period::DateRange;
use chrono::NaiveDate;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// A DWD weather station reporting daily climate (`KL`) values.
///
/// Stations are immutable once loaded; a catalog refresh replaces the whole
/// set rather than editing individual records.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// DWD station id, zero-padded to five digits (e.g. "00433" for Berlin-Tempelhof).
    pub id: String,
    pub name: String,
    /// Federal state (Bundesland) as written in the DWD description file.
    pub state: String,
    /// Station height above sea level in meters.
    pub elevation_m: Option<i32>,
    pub coordinate: Coordinate,
    /// First day with daily records.
    pub observation_start: NaiveDate,
    /// Last day with daily records (for active stations: close to today).
    pub observation_end: NaiveDate,
}

impl Station {
    /// The reported record period, or `None` if the description file lists
    /// an end before the start.
    pub fn observation_period(&self) -> Option<DateRange> {
        DateRange::new(self.observation_start, self.observation_end)
    }
}

// --- R-Tree Implementations ---

/// Stations are indexed as points on the unit sphere so that the R-tree's
/// Euclidean nearest-neighbour order equals great-circle order.
impl RTreeObject for Station {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coordinate.unit_vector())
    }
}

impl PointDistance for Station {
    /// Squared chord distance between the station and a unit-sphere query point.
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let own = self.coordinate.unit_vector();
        let dx = own[0] - point[0];
        let dy = own[1] - point[1];
        let dz = own[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}
