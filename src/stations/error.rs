use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {0}")]
    ResponseBody(String, #[source] reqwest::Error),

    #[error("Invalid station API url '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Station API returned no data lines")]
    EmptyResponse,

    #[error("Malformed station line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Giving up on {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<StationError>,
    },
}
