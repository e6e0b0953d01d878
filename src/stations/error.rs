use crate::retry::{is_retryable_reqwest, is_retryable_status, Transient};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateStationError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Station description from {url} contained no usable stations")]
    EmptyCatalog { url: String },

    #[error("Station catalog unavailable and no cached copy exists")]
    CatalogUnavailable(#[source] Box<LocateStationError>),

    #[error("No station with daily records near ({latitude}, {longitude}) matching {filter}")]
    NoStationAvailable {
        latitude: f64,
        longitude: f64,
        filter: String,
    },

    // Covers errors joining tokio blocking tasks
    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Transient for LocateStationError {
    fn is_transient(&self) -> bool {
        match self {
            LocateStationError::NetworkRequest(_, e) => is_retryable_reqwest(e) || e.is_request(),
            LocateStationError::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}
