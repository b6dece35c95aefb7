use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kma_stations::{
    build_http_client, AddressType, AzureConfig, BlobUploader, Config, GeocodeFailurePolicy,
    KmaConfig, Location, SgisClient, SgisConfig, StationClient, StationEnricher,
    DEFAULT_BLOB_PREFIX, DEFAULT_KMA_BASE_URL, DEFAULT_SGIS_BASE_URL, ENV_AZURE_CONNECTION_STRING,
    ENV_AZURE_CONTAINER, ENV_KMA_AUTH_KEY, ENV_KMA_BASE_URL, ENV_SGIS_BASE_URL,
    ENV_SGIS_CONSUMER_KEY, ENV_SGIS_CONSUMER_SECRET,
};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "kma-stations",
    version,
    about = "Enrich KMA weather stations with reverse-geocoded addresses and publish them as CSV"
)]
struct Cli {
    #[command(flatten)]
    services: ServiceArgs,

    #[command(subcommand)]
    command: Command,
}

/// Credentials and endpoints. Each one can also come from the environment or a `.env` file.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// KMA API Hub authentication key
    #[arg(long, env = ENV_KMA_AUTH_KEY, hide_env_values = true, global = true)]
    kma_auth_key: Option<String>,

    #[arg(long, env = ENV_KMA_BASE_URL, default_value = DEFAULT_KMA_BASE_URL, global = true)]
    kma_base_url: String,

    /// SGIS OpenAPI consumer key
    #[arg(long, env = ENV_SGIS_CONSUMER_KEY, hide_env_values = true, global = true)]
    sgis_consumer_key: Option<String>,

    /// SGIS OpenAPI consumer secret
    #[arg(long, env = ENV_SGIS_CONSUMER_SECRET, hide_env_values = true, global = true)]
    sgis_consumer_secret: Option<String>,

    #[arg(long, env = ENV_SGIS_BASE_URL, default_value = DEFAULT_SGIS_BASE_URL, global = true)]
    sgis_base_url: String,

    /// Azure storage connection string (account key or SAS)
    #[arg(long, env = ENV_AZURE_CONNECTION_STRING, hide_env_values = true, global = true)]
    azure_connection_string: Option<String>,

    /// Azure container (file system) name
    #[arg(long, env = ENV_AZURE_CONTAINER, global = true)]
    azure_container: Option<String>,

    /// Blob path, or directory prefix ending in '/', for uploads
    #[arg(long, default_value = DEFAULT_BLOB_PREFIX, global = true)]
    blob_path: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 100, global = true)]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, geocode, write CSV and upload (the full pipeline)
    Run(RunArgs),
    /// Fetch and print the raw station list
    Stations(StationsArgs),
    /// Resolve a single coordinate pair to an address
    ReverseGeocode(ReverseGeocodeArgs),
    /// Look up coordinates for an address
    Geocode(GeocodeArgs),
    /// Upload a local file to the data lake
    Upload(UploadArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Station list timestamp YYYYMMDDHHMM (KST); defaults to now
    #[arg(long)]
    tm: Option<String>,

    /// Directory for the CSV file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the CSV but do not upload it
    #[arg(long)]
    no_upload: bool,

    /// Do not start the CSV with a UTF-8 byte order mark
    #[arg(long)]
    no_bom: bool,

    /// Address type: jibun (10), road (20) or administrative (21)
    #[arg(long, default_value = "road")]
    addr_type: AddressType,

    /// Stop at the first station that cannot be geocoded instead of leaving its address blank
    #[arg(long)]
    abort_on_geocode_error: bool,
}

#[derive(Args, Debug)]
struct StationsArgs {
    #[arg(long)]
    tm: Option<String>,

    /// Print JSON instead of one line per station
    #[arg(long)]
    json: bool,

    /// Write the stations as JSON to this file instead of printing them
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReverseGeocodeArgs {
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, default_value = "road")]
    addr_type: AddressType,
}

#[derive(Args, Debug)]
struct GeocodeArgs {
    address: String,

    /// Zero-based result page
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Results per page
    #[arg(long, default_value_t = 5)]
    count: u32,
}

#[derive(Args, Debug)]
struct UploadArgs {
    file: PathBuf,

    /// Blob name or prefix for this upload; overrides --blob-path
    #[arg(long)]
    blob: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let services = &cli.services;

    match cli.command {
        Command::Run(ref args) => {
            let config = Config::builder()
                .kma(kma_config(services)?)
                .sgis(sgis_config(services)?)
                .maybe_azure(azure_config(services).ok())
                .http_timeout(Duration::from_secs(services.timeout_secs))
                .build();
            let policy = if args.abort_on_geocode_error {
                GeocodeFailurePolicy::Abort
            } else {
                GeocodeFailurePolicy::LeaveBlank
            };
            let enricher = StationEnricher::builder()
                .config(config)
                .address_type(args.addr_type)
                .failure_policy(policy)
                .build()?;

            let report = enricher
                .run()
                .maybe_tm(args.tm.clone())
                .output_dir(args.output_dir.clone())
                .maybe_upload(args.no_upload.then_some(false))
                .include_bom(!args.no_bom)
                .call()
                .await?;

            println!("tm:        {}", report.tm);
            println!("stations:  {}", report.stations);
            println!("geocoded:  {}", report.geocoded);
            println!("no match:  {}", report.geocode_failures.len());
            println!("csv:       {}", report.csv_path.display());
            match &report.uploaded_blob {
                Some(blob) => println!("uploaded:  {}", blob),
                None => println!("uploaded:  no"),
            }
            for failure in &report.geocode_failures {
                println!("  station {}: {}", failure.station_id, failure.message);
            }
            Ok(())
        }
        Command::Stations(ref args) => {
            let http = build_http_client(Duration::from_secs(services.timeout_secs))?;
            let client = StationClient::new(http, kma_config(services)?);
            let tm = args
                .tm
                .clone()
                .unwrap_or_else(|| kma_stations::kst_timestamp(chrono::Utc::now()));
            let stations = client.fetch(&tm).await?;
            if let Some(path) = &args.output {
                let json = serde_json::to_vec_pretty(&stations)?;
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write '{}'", path.display()))?;
                info!("Wrote {} stations to {}", stations.len(), path.display());
                return Ok(());
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stations)?);
            } else {
                for s in &stations {
                    println!(
                        "{:>4}  {:<10} {:<24} {:>12.6} {:>11.6}",
                        s.id, s.name_ko, s.name_en, s.location.longitude, s.location.latitude
                    );
                }
            }
            info!("{} stations", stations.len());
            Ok(())
        }
        Command::ReverseGeocode(ref args) => {
            let client = sgis_client(services)?;
            let address = client
                .reverse_geocode(Location::new(args.lon, args.lat), args.addr_type)
                .await?;
            println!("{}", serde_json::to_string_pretty(&address)?);
            Ok(())
        }
        Command::Geocode(ref args) => {
            let client = sgis_client(services)?;
            let hits = client.geocode(&args.address, args.page, args.count).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }
        Command::Upload(ref args) => {
            let azure = azure_config(services)?;
            let http = build_http_client(Duration::from_secs(services.timeout_secs))?;
            let uploader = BlobUploader::from_connection_string(http, &azure.connection_string)?;
            let blob_path = args.blob.as_deref().unwrap_or(&azure.blob_path);
            let blob = uploader
                .upload_file(&azure.container, blob_path, &args.file)
                .await?;
            println!("{}/{}", azure.container, blob);
            Ok(())
        }
    }
}

fn kma_config(args: &ServiceArgs) -> Result<KmaConfig> {
    let auth_key = args
        .kma_auth_key
        .clone()
        .context("KMA_API_AUTH_KEY (or --kma-auth-key) must be set")?;
    Ok(KmaConfig::builder()
        .auth_key(auth_key)
        .base_url(args.kma_base_url.clone())
        .build())
}

fn sgis_config(args: &ServiceArgs) -> Result<SgisConfig> {
    let consumer_key = args
        .sgis_consumer_key
        .clone()
        .context("SGIS_CONSUMER_KEY (or --sgis-consumer-key) must be set")?;
    let consumer_secret = args
        .sgis_consumer_secret
        .clone()
        .context("SGIS_CONSUMER_SECRET (or --sgis-consumer-secret) must be set")?;
    Ok(SgisConfig::builder()
        .consumer_key(consumer_key)
        .consumer_secret(consumer_secret)
        .base_url(args.sgis_base_url.clone())
        .build())
}

fn sgis_client(args: &ServiceArgs) -> Result<SgisClient> {
    let http = build_http_client(Duration::from_secs(args.timeout_secs))?;
    Ok(SgisClient::new(http, sgis_config(args)?))
}

fn azure_config(args: &ServiceArgs) -> Result<AzureConfig> {
    let connection_string = args
        .azure_connection_string
        .clone()
        .context("AZURE_STORAGE_CONNECTION_STRING (or --azure-connection-string) must be set")?;
    let container = args
        .azure_container
        .clone()
        .context("AZURE_CONTAINER_NAME (or --azure-container) must be set")?;
    Ok(AzureConfig::builder()
        .connection_string(connection_string)
        .container(container)
        .blob_path(args.blob_path.clone())
        .build())
}
