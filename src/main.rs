mod aggregator;
mod bluetooth;
mod config;
mod models;
mod reporting;
mod scheduler;
#[cfg(test)]
mod testing;
mod utils;

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use url::Url;

use bluetooth::BluerScanner;
use config::BeaconConfig;
use reporting::HttpTransport;
use scheduler::CollectionLoop;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_SERVER_URL: &str = "http://localhost:3000/api/beacons/data";

/// Scan nearby Bluetooth LE devices and report their mean signal strength
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the beacon configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Collector endpoint receiving the reports
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    // Load configuration
    let config = match BeaconConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Loaded configuration: id={:?}, location={:?}",
        config.identity.beacon_id, config.identity.location
    );

    let server_url = match Url::parse(&args.server) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid server URL {}: {}", args.server, e);
            return Err(e.into());
        }
    };

    let collection = CollectionLoop::new(
        config.identity,
        config.scan,
        server_url,
        BluerScanner::new(),
        HttpTransport::new(),
    );

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Holding the sender keeps the receiver pending forever
                let _keep = tx;
                std::future::pending::<()>().await;
            }
        }
    });

    // Run the loop until a shutdown signal arrives
    tokio::select! {
        _ = collection.run_forever() => {}
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
