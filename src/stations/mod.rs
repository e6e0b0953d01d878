//! The DWD station catalog and nearest-station search.

pub mod catalog;
pub mod description;
pub mod error;
pub mod filter;
pub mod locate_station;

use crate::stations::error::LocateStationError;
use crate::types::station::Station;
use async_trait::async_trait;

/// Delivers the complete list of daily-climate stations in one go.
#[async_trait]
pub trait StationSource: Send + Sync {
    async fn fetch_stations(&self) -> Result<Vec<Station>, LocateStationError>;
}
