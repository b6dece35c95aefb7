use crate::config::ConfigError;
use crate::geocoding::error::GeocodeError;
use crate::stations::error::StationError;
use crate::storage::error::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KmaError {
    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to create output directory '{0}'")]
    OutputDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Geocoding failed for station {station_id}")]
    GeocodeAborted {
        station_id: u32,
        #[source]
        source: GeocodeError,
    },

    #[error("Upload requested but no Azure storage settings are configured")]
    UploadNotConfigured,
}
