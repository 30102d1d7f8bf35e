//! tracehub — distributed tracing pipeline for the admin service.
//!
//! Accepts an optional config-file path as the first argument; defaults
//! are usable for local runs.

use std::path::Path;
use tokio::net::TcpListener;

use tracehub::config::{loader, ServiceConfig};
use tracehub::lifecycle::{signals, Shutdown};
use tracehub::observability::{logging, metrics};
use tracehub::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => loader::load_config(Path::new(&path))?,
        None => ServiceConfig::default(),
    };

    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.server.bind_address,
        data_dir = %config.storage.data_dir,
        batch_size = config.collector.batch_size,
        flush_interval_secs = config.collector.flush_interval_secs,
        "tracehub starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config);
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
