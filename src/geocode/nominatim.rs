//! Nominatim (OpenStreetMap) adapter for postal-code lookups.
//!
//! Nominatim's usage policy allows at most one request per second and
//! requires an identifying User-Agent; both are enforced here.

use crate::geocode::error::GeocodeError;
use crate::geocode::{GeocodeCandidate, GeocodingService};
use crate::types::coordinate::Coordinate;
use crate::types::postal_code::PostalCode;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1100);

#[derive(Debug)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
    country_code: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

/// Raw Nominatim search result; coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

impl NominatimClient {
    pub fn new(
        base_url: &str,
        country_code: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(GeocodeError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            country_code: country_code.to_string(),
            min_interval: MIN_REQUEST_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    /// Overrides the spacing between requests (tests against a local mock).
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiting geocoding request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn parse_results(
        url: &str,
        results: Vec<NominatimResult>,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        results
            .into_iter()
            .map(|result| {
                let invalid = |message: String| GeocodeError::InvalidResponse {
                    url: url.to_string(),
                    message,
                };
                let latitude: f64 = result
                    .lat
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid latitude '{}'", result.lat)))?;
                let longitude: f64 = result
                    .lon
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid longitude '{}'", result.lon)))?;
                let coordinate =
                    Coordinate::new(latitude, longitude).map_err(|e| invalid(e.to_string()))?;
                Ok(GeocodeCandidate {
                    coordinate,
                    display_name: result.display_name.unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl GeocodingService for NominatimClient {
    async fn search_postal_code(
        &self,
        postal_code: &PostalCode,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        self.rate_limit().await;

        let url = format!("{}/search", self.base_url);
        let params = [
            ("postalcode", postal_code.as_str()),
            ("countrycodes", self.country_code.as_str()),
            ("format", "jsonv2"),
            ("limit", "1"),
        ];
        info!("Geocoding postal code {} via {}", postal_code, url);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => GeocodeError::HttpStatus {
                        url,
                        status,
                        source: e,
                    },
                    None => GeocodeError::NetworkRequest(url, e),
                });
            }
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(url.clone(), e))?;
        let results: Vec<NominatimResult> =
            serde_json::from_slice(&body).map_err(|e| GeocodeError::InvalidResponse {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Self::parse_results(&url, results)
    }
}
