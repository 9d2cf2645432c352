mod api;
mod config;
mod data;
mod error;
mod hub;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::interval;

use crate::api::{create_router, ApiState};
use crate::config::{Config, STATS_INTERVAL_SECS};
use crate::data::{IngestionPoller, PolygonSource, PollerSettings, RandomPriceGenerator, SnapshotCache};
use crate::hub::Hub;
use crate::websocket::{Broadcaster, SubscriberSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before reading configuration
    let dotenv = dotenvy::dotenv();
    let config = Config::from_env();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    config.log_config();

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    let (hub, queue) = Hub::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(Broadcaster::new(&hub, queue).run());

    let source = PolygonSource::new(config.api_key(), config.polygon_base_url.clone(), config.max_pages)?;
    let poller = IngestionPoller::new(
        hub.clone(),
        Arc::new(source),
        Arc::new(RandomPriceGenerator::from(&config)),
        PollerSettings::from(&config),
    )
    .with_cache(SnapshotCache::new(&config.snapshot_file));
    let poller_task = tokio::spawn(poller.run(shutdown_rx));

    start_stats_task(hub.clone());

    let router = create_router(ApiState::new(hub.clone(), SubscriberSettings::from(&config)));
    let bind_address = config.bind_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("HTTP API running at http://{}/api/stocks", bind_address);
    info!("WebSocket feed at ws://{}/ws", bind_address);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(hub.clone(), shutdown_tx))
        .await?;

    if let Err(e) = poller_task.await {
        error!("Poller task ended abnormally: {:?}", e);
    }

    info!("Shut down gracefully");
    Ok(())
}

fn start_stats_task(hub: Hub) {
    tokio::spawn(async move {
        let mut interval_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));

        loop {
            interval_timer.tick().await;
            let subscribers = hub.registry().len();
            let instruments = hub.store().current().len();

            if subscribers > 0 || instruments > 0 {
                info!("Stats - Subscribers: {}, Instruments: {}", subscribers, instruments);
            }
        }
    });

    info!("Started stats monitoring task (every {} seconds)", STATS_INTERVAL_SECS);
}

// Resolves on Ctrl-C or SIGTERM, after stopping the poller and closing every subscriber
async fn shutdown_signal(hub: Hub, shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);
    hub.registry().close_all();
}
