//! Which stations qualify for a nearest-station search.

use crate::types::period::DateRange;
use crate::types::station::Station;
use chrono::NaiveDate;
use std::fmt;

/// How much of a requested period a station's record must span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoveragePolicy {
    /// Any overlap with the requested period is enough; gaps show up as
    /// missing days in the result.
    #[default]
    Overlap,
    /// The station's record must span the whole requested period.
    Full,
}

impl CoveragePolicy {
    pub fn filter_for(&self, period: DateRange) -> StationFilter {
        match self {
            CoveragePolicy::Overlap => StationFilter::Overlaps(period),
            CoveragePolicy::Full => StationFilter::Covers(period),
        }
    }
}

/// Criterion applied to every candidate station before distance is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationFilter {
    /// At least one day of daily records.
    Any,
    /// Records reaching up to at least this date.
    ActiveSince(NaiveDate),
    /// Records overlapping the range.
    Overlaps(DateRange),
    /// Records spanning the whole range.
    Covers(DateRange),
}

impl StationFilter {
    pub fn accepts(&self, station: &Station) -> bool {
        let Some(record) = station.observation_period() else {
            return false;
        };
        match self {
            StationFilter::Any => true,
            StationFilter::ActiveSince(date) => record.end >= *date,
            StationFilter::Overlaps(range) => record.overlaps(range),
            StationFilter::Covers(range) => record.covers(range),
        }
    }
}

impl fmt::Display for StationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationFilter::Any => write!(f, "any daily records"),
            StationFilter::ActiveSince(date) => write!(f, "records up to at least {}", date),
            StationFilter::Overlaps(range) => write!(f, "records overlapping {}", range),
            StationFilter::Covers(range) => write!(f, "records covering {}", range),
        }
    }
}
