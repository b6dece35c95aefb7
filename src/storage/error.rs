use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to build station frame")]
    FrameBuild(#[source] PolarsError),

    #[error("Failed to write CSV file '{0}'")]
    CsvWrite(PathBuf, #[source] PolarsError),

    #[error("Failed to read CSV file '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Required column '{column}' not found in '{path}'")]
    MissingColumn {
        path: PathBuf,
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("Invalid {column} value '{value}' in row {row} of '{path}'")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Invalid Azure storage connection string: {0}")]
    ConnectionString(String),

    #[error("Azure account key is not valid base64")]
    AccountKey(#[source] base64::DecodeError),

    #[error("Failed to sign Azure request: {0}")]
    Signing(String),

    #[error("Invalid blob url: {0}")]
    BlobUrl(String),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Upload to {url} failed with status {status}: {body}")]
    UploadStatus {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}
