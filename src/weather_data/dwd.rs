//! DWD Climate Data Center (opendata.dwd.de) adapter for the daily `KL`
//! product: station description, recent window and historical archive.

use crate::stations::description::{decode_text, parse_station_description};
use crate::stations::error::LocateStationError;
use crate::stations::StationSource;
use crate::types::observation::TemperatureObservation;
use crate::types::period::DateRange;
use crate::types::station::Station;
use crate::weather_data::data_loader::parse_product_archive;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::source::{ArchiveSegment, ObservationSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{info, warn};
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

pub const DWD_KL_DAILY_URL: &str =
    "https://opendata.dwd.de/climate_environment/CDC/observations_germany/climate/daily/kl";
const STATION_DESCRIPTION_FILE: &str = "KL_Tageswerte_Beschreibung_Stationen.txt";

static HISTORICAL_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"tageswerte_KL_(\d{5})_(\d{8})_(\d{8})_hist\.zip").expect("valid regex")
});

#[derive(Debug, Clone)]
pub struct DwdClient {
    client: Client,
    base_url: String,
}

impl DwdClient {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, WeatherDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(WeatherDataError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn station_description_url(&self) -> String {
        format!("{}/recent/{}", self.base_url, STATION_DESCRIPTION_FILE)
    }

    pub fn recent_url(&self, station_id: &str) -> String {
        format!(
            "{}/recent/tageswerte_KL_{:0>5}_akt.zip",
            self.base_url, station_id
        )
    }

    pub fn historical_listing_url(&self) -> String {
        format!("{}/historical/", self.base_url)
    }

    pub fn historical_url(&self, file_name: &str) -> String {
        format!("{}/historical/{}", self.base_url, file_name)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, WeatherDataError> {
        info!("Downloading data from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(StatusCode::NOT_FOUND) => WeatherDataError::NotFound {
                        url: url.to_string(),
                    },
                    Some(status) => WeatherDataError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => WeatherDataError::NetworkRequest(url.to_string(), e),
                });
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }
}

/// Scans an HTML directory listing for historical `KL` archives.
pub fn parse_archive_listing(listing: &str) -> Vec<ArchiveSegment> {
    let file_names: BTreeSet<&str> = HISTORICAL_FILE_RE
        .find_iter(listing)
        .map(|m| m.as_str())
        .collect();

    file_names
        .into_iter()
        .filter_map(|file_name| {
            let captures = HISTORICAL_FILE_RE.captures(file_name)?;
            let from = NaiveDate::parse_from_str(&captures[2], "%Y%m%d").ok()?;
            let to = NaiveDate::parse_from_str(&captures[3], "%Y%m%d").ok()?;
            Some(ArchiveSegment {
                file_name: file_name.to_string(),
                station_id: captures[1].to_string(),
                coverage: DateRange::new(from, to)?,
            })
        })
        .collect()
}

#[async_trait]
impl StationSource for DwdClient {
    async fn fetch_stations(&self) -> Result<Vec<Station>, LocateStationError> {
        let url = self.station_description_url();
        let bytes = self.download(&url).await.map_err(|e| match e {
            WeatherDataError::HttpStatus {
                url,
                status,
                source,
            } => LocateStationError::HttpStatus {
                url,
                status,
                source,
            },
            WeatherDataError::NetworkRequest(url, source) => {
                LocateStationError::NetworkRequest(url, source)
            }
            _ => LocateStationError::EmptyCatalog { url: url.clone() },
        })?;

        let stations = parse_station_description(&decode_text(bytes));
        if stations.is_empty() {
            return Err(LocateStationError::EmptyCatalog { url });
        }
        info!("Fetched {} stations from {}", stations.len(), url);
        Ok(stations)
    }
}

#[async_trait]
impl ObservationSource for DwdClient {
    async fn recent(
        &self,
        station_id: &str,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
        let url = self.recent_url(station_id);
        let bytes = self.download(&url).await?;
        let file_name = url.rsplit('/').next().unwrap_or(url.as_str());
        parse_product_archive(file_name, bytes).await
    }

    async fn archive_listing(&self) -> Result<Vec<ArchiveSegment>, WeatherDataError> {
        let url = self.historical_listing_url();
        let bytes = self.download(&url).await?;
        let segments = parse_archive_listing(&decode_text(bytes));
        if segments.is_empty() {
            return Err(WeatherDataError::EmptyListing { url });
        }
        info!("Historical listing has {} archives", segments.len());
        Ok(segments)
    }

    async fn archive_segment(
        &self,
        segment: &ArchiveSegment,
    ) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
        let bytes = self.download(&self.historical_url(&segment.file_name)).await?;
        parse_product_archive(&segment.file_name, bytes).await
    }
}
