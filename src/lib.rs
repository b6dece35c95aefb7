//! Fetches KMA (Korea Meteorological Administration) surface station metadata,
//! resolves each station's coordinates to an administrative address with the
//! SGIS reverse-geocoding API, and publishes the result as CSV to Azure Data
//! Lake Storage.

mod config;
mod error;
mod geocoding;
mod pipeline;
mod stations;
mod storage;
mod types;
mod utils;

pub use config::*;
pub use error::KmaError;
pub use pipeline::*;

pub use geocoding::error::GeocodeError;
pub use geocoding::response::GeocodeResult;
pub use geocoding::sgis::SgisClient;

pub use stations::client::StationClient;
pub use stations::error::StationError;
pub use stations::parser::parse_station_text;

pub use storage::azure::{resolve_blob_name, BlobUploader};
pub use storage::csv::{default_file_name, default_path, read_csv, write_csv, COLUMNS};
pub use storage::error::StorageError;

pub use types::address::{Address, AddressType};
pub use types::station::{EnrichedStation, Heights, Location, Station};

pub use utils::kst_timestamp;
