use crate::retry::{is_retryable_reqwest, is_retryable_status, Transient};
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherDataError {
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

    #[error("No file at {url}")]
    NotFound { url: String },

    #[error("Archive listing at {url} contained no daily climate archives")]
    EmptyListing { url: String },

    #[error("No historical archive segments listed for station {station}")]
    NoArchiveSegments { station: String },

    #[error("Failed to open zip archive '{archive}'")]
    ZipArchive {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Zip archive '{archive}' contains no produkt_klima_tag file")]
    MissingProductFile { archive: String },

    // Errors during CSV reading (inside blocking task)
    #[error("I/O error processing CSV data from '{archive}'")]
    CsvReadIo {
        archive: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parsing error processing CSV data from '{archive}'")]
    CsvReadPolars {
        archive: String,
        #[source]
        source: PolarsError,
    },

    #[error("Missing required column '{column}' in '{archive}'")]
    MissingColumn { archive: String, column: String },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error(
        "No temperature data for station {station} (recent: {recent}; historical: {historical})"
    )]
    ObservationUnavailable {
        station: String,
        recent: String,
        historical: String,
    },
}

impl Transient for WeatherDataError {
    fn is_transient(&self) -> bool {
        match self {
            WeatherDataError::NetworkRequest(_, e) => is_retryable_reqwest(e) || e.is_request(),
            WeatherDataError::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_not_transient() {
        let err = WeatherDataError::NotFound {
            url: "https://example.invalid/x.zip".into(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("x.zip"));
    }
}
