//! The main entry point: fetch the KMA station list, reverse-geocode every
//! station, write the enriched list to CSV and publish it to Azure Data Lake.

use crate::config::{AzureConfig, Config};
use crate::error::KmaError;
use crate::geocoding::sgis::SgisClient;
use crate::stations::client::StationClient;
use crate::storage::azure::BlobUploader;
use crate::storage::csv::{default_path, write_csv};
use crate::types::address::AddressType;
use crate::types::station::{EnrichedStation, Station};
use crate::utils::{ensure_dir_exists, kst_timestamp};
use bon::bon;
use chrono::Utc;
use log::{error, info, warn};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// What to do when a single station cannot be geocoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeocodeFailurePolicy {
    /// Keep the station with an empty address and record the failure in the report.
    #[default]
    LeaveBlank,
    /// Stop the run and return the error.
    Abort,
}

/// A station whose coordinates could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeFailure {
    pub station_id: u32,
    pub message: String,
}

/// Outcome of a [`StationEnricher::run`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// The `tm` the station list was requested for.
    pub tm: String,
    /// Number of stations fetched, which is also the number of CSV rows.
    pub stations: usize,
    /// Stations that received an address.
    pub geocoded: usize,
    pub geocode_failures: Vec<GeocodeFailure>,
    pub csv_path: PathBuf,
    /// Blob name the CSV was uploaded to, if it was uploaded.
    pub uploaded_blob: Option<String>,
}

/// Runs the fetch → enrich → persist pipeline.
///
/// # Examples
///
/// ```no_run
/// # use kma_stations::{Config, StationEnricher, KmaError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), KmaError> {
/// let enricher = StationEnricher::builder()
///     .config(Config::from_env()?)
///     .build()?;
/// let report = enricher.run().output_dir("data").call().await?;
/// println!("{} stations written to {}", report.stations, report.csv_path.display());
/// # Ok(())
/// # }
/// ```
pub struct StationEnricher {
    stations: StationClient,
    geocoder: SgisClient,
    uploader: Option<(BlobUploader, AzureConfig)>,
    address_type: AddressType,
    failure_policy: GeocodeFailurePolicy,
}

#[bon]
impl StationEnricher {
    /// Creates the enricher and its HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns [`KmaError::HttpClient`] if the HTTP client cannot be built and
    /// [`KmaError::Storage`] if the Azure connection string is invalid.
    #[builder]
    pub fn new(
        config: Config,
        address_type: Option<AddressType>,
        failure_policy: Option<GeocodeFailurePolicy>,
    ) -> Result<Self, KmaError> {
        let http = build_http_client(config.http_timeout)?;
        let uploader = match config.azure {
            Some(azure) => Some((
                BlobUploader::from_connection_string(http.clone(), &azure.connection_string)?,
                azure,
            )),
            None => None,
        };
        Ok(Self {
            stations: StationClient::new(http.clone(), config.kma),
            geocoder: SgisClient::new(http, config.sgis),
            uploader,
            address_type: address_type.unwrap_or_default(),
            failure_policy: failure_policy.unwrap_or_default(),
        })
    }

    /// The KMA client, for fetching the station list on its own.
    pub fn station_client(&self) -> &StationClient {
        &self.stations
    }

    /// The SGIS client, sharing the enricher's access token.
    pub fn geocoder(&self) -> &SgisClient {
        &self.geocoder
    }

    /// Runs the whole pipeline.
    ///
    /// * `.tm(String)`: station list timestamp `YYYYMMDDHHMM` (KST). Defaults to now.
    /// * `.output_dir(PathBuf)`: directory for the CSV. Defaults to the working directory.
    /// * `.upload(bool)`: upload the CSV. Defaults to `true` when Azure is configured.
    /// * `.include_bom(bool)`: start the CSV with a UTF-8 BOM. Defaults to `true`.
    ///
    /// The CSV is written before the upload starts, so an upload failure
    /// leaves the file in place for a manual upload.
    ///
    /// # Errors
    ///
    /// Returns [`KmaError::Geocode`] if SGIS rejects the consumer credentials,
    /// [`KmaError::Station`] if the station list cannot be fetched,
    /// [`KmaError::GeocodeAborted`] under [`GeocodeFailurePolicy::Abort`] or
    /// for an error that would repeat for every station,
    /// [`KmaError::Storage`] for CSV or upload failures, and
    /// [`KmaError::UploadNotConfigured`] when `upload(true)` is requested
    /// without Azure settings.
    #[builder]
    pub async fn run(
        &self,
        #[builder(into)] tm: Option<String>,
        #[builder(into)] output_dir: Option<PathBuf>,
        upload: Option<bool>,
        include_bom: Option<bool>,
    ) -> Result<PipelineReport, KmaError> {
        let tm = tm.unwrap_or_else(|| kst_timestamp(Utc::now()));
        let output_dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
        let upload = match (upload, &self.uploader) {
            (Some(true), None) => return Err(KmaError::UploadNotConfigured),
            (Some(requested), _) => requested,
            (None, configured) => configured.is_some(),
        };

        // Rejected credentials fail the run before any station is fetched.
        self.geocoder.authenticate().await?;

        info!("Fetching station list for tm={}", tm);
        let stations = self.stations.fetch(&tm).await?;

        let (rows, geocode_failures) = self.enrich(stations).await?;
        let geocoded = rows.len() - geocode_failures.len();

        ensure_dir_exists(&output_dir)
            .await
            .map_err(|e| KmaError::OutputDirCreation(output_dir.clone(), e))?;
        let csv_path = default_path(&output_dir, &tm);
        write_csv(&csv_path, &rows, include_bom.unwrap_or(true)).await?;
        info!("Wrote {} stations to {}", rows.len(), csv_path.display());

        let uploaded_blob = match (&self.uploader, upload) {
            (Some((uploader, azure)), true) => {
                match uploader
                    .upload_file(&azure.container, &azure.blob_path, &csv_path)
                    .await
                {
                    Ok(blob) => Some(blob),
                    Err(e) => {
                        error!(
                            "Upload failed; '{}' is kept for manual upload",
                            csv_path.display()
                        );
                        return Err(e.into());
                    }
                }
            }
            _ => {
                info!(
                    "Upload skipped; upload '{}' to the data lake manually if needed",
                    csv_path.display()
                );
                None
            }
        };

        Ok(PipelineReport {
            tm,
            stations: rows.len(),
            geocoded,
            geocode_failures,
            csv_path,
            uploaded_blob,
        })
    }

    /// Reverse-geocodes every station in order, one request at a time.
    ///
    /// The result holds exactly one row per input station, in input order.
    /// Errors for which [`GeocodeError::is_fatal`](crate::GeocodeError::is_fatal) holds stop the run under
    /// either policy.
    pub async fn enrich(
        &self,
        stations: Vec<Station>,
    ) -> Result<(Vec<EnrichedStation>, Vec<GeocodeFailure>), KmaError> {
        let total = stations.len();
        let mut rows = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, station) in stations.into_iter().enumerate() {
            match self
                .geocoder
                .reverse_geocode(station.location, self.address_type)
                .await
            {
                Ok(address) => rows.push(EnrichedStation::new(station, address)),
                Err(e) if e.is_fatal() || self.failure_policy == GeocodeFailurePolicy::Abort => {
                    return Err(KmaError::GeocodeAborted {
                        station_id: station.id,
                        source: e,
                    })
                }
                Err(e) => {
                    warn!(
                        "Station {} ({}) left without address: {}",
                        station.id, station.name_ko, e
                    );
                    failures.push(GeocodeFailure {
                        station_id: station.id,
                        message: e.to_string(),
                    });
                    rows.push(EnrichedStation::without_address(station));
                }
            }
            if (i + 1) % 100 == 0 {
                info!("Geocoded {}/{} stations", i + 1, total);
            }
        }

        info!(
            "Geocoding finished: {} resolved, {} without address",
            total - failures.len(),
            failures.len()
        );
        Ok((rows, failures))
    }
}

/// Builds the HTTP client shared by all service clients.
pub fn build_http_client(timeout: Duration) -> Result<Client, KmaError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kma-stations/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(KmaError::HttpClient)
}
