use crate::retry::{is_retryable_reqwest, is_retryable_status, Transient};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("No geocoding result for postal code {0}")]
    NotFound(String),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unusable geocoding response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl Transient for GeocodeError {
    fn is_transient(&self) -> bool {
        match self {
            GeocodeError::NetworkRequest(_, e) => is_retryable_reqwest(e) || e.is_request(),
            GeocodeError::HttpStatus { status, .. } => is_retryable_status(*status),
            GeocodeError::NotFound(_)
            | GeocodeError::ClientBuild(_)
            | GeocodeError::InvalidResponse { .. } => false,
        }
    }
}
