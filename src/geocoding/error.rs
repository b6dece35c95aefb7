use crate::geocoding::sgis::CODE_INVALID_TOKEN;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid SGIS url '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Failed to parse SGIS response from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("SGIS authentication failed ({code}): {message}")]
    Authentication { code: i64, message: String },

    #[error("SGIS authentication response did not contain an access token")]
    MissingToken,

    #[error("SGIS request failed ({code}): {message}")]
    Api { code: i64, message: String },

    #[error("No address found for longitude {longitude}, latitude {latitude}")]
    NoResult { longitude: f64, latitude: f64 },
}

impl GeocodeError {
    /// Whether the error would repeat for every remaining station, such as
    /// rejected credentials or a token SGIS keeps refusing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GeocodeError::Authentication { .. }
                | GeocodeError::MissingToken
                | GeocodeError::InvalidUrl(..)
                | GeocodeError::Api {
                    code: CODE_INVALID_TOKEN,
                    ..
                }
        )
    }
}
