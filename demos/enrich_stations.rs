// demos/enrich_stations.rs
use kma_stations::{kst_timestamp, AddressType, Config, KmaError, StationEnricher};

#[tokio::main]
async fn main() -> Result<(), KmaError> {
    // Credentials come from the environment or a .env file.
    // Set RUST_LOG=info (or debug) to see request logs.
    dotenvy::dotenv().ok();
    env_logger::init();

    let enricher = StationEnricher::builder()
        .config(Config::from_env()?)
        .address_type(AddressType::Administrative)
        .build()?;

    let tm = kst_timestamp(chrono::Utc::now());
    let stations = enricher.station_client().fetch(&tm).await?;
    println!("{} stations valid at {}", stations.len(), tm);

    // Resolve only the first few stations
    for station in stations.iter().take(5) {
        match enricher
            .geocoder()
            .reverse_geocode(station.location, AddressType::Administrative)
            .await
        {
            Ok(address) => println!(
                "{:>4} {:<8} {}",
                station.id, station.name_ko, address.full_address
            ),
            Err(e) => println!("{:>4} {:<8} no address: {}", station.id, station.name_ko, e),
        }
    }

    Ok(())
}
