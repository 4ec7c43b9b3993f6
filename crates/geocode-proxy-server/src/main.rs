use clap::Parser;
use geocode_proxy_core::provider::Provider;
use geocode_proxy_server::server::{
    config::{CliArgs, ServerConfig},
    http::router,
    provider::GoogleGeocoder,
    service::GeocodeService,
    telemetry::init_telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(&config)?;

    if !config.google.has_credentials() {
        tracing::warn!("No Google credentials configured, provider calls will be denied");
    } else if config.google.premium.is_some() {
        tracing::info!("Signing Google requests with premium client credentials");
    }
    let provider: Arc<dyn Provider> =
        Arc::new(GoogleGeocoder::new(&config.google, config.provider_timeout)?);
    let service = GeocodeService::new(&config, provider);

    if config.probe {
        probe(&service, &config.test_address).await;
    }

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config.server_addr, &config);

    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = service.shutdown().await {
        tracing::error!("Error during service shutdown: {e:?}");
    }

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

async fn probe(service: &GeocodeService, address: &str) {
    let result = service.probe(address).await;
    match result.location() {
        Some(location) => tracing::info!(
            "Probe geocoded '{}' to {{{}, {}}}",
            address,
            location.lat,
            location.lng
        ),
        None => tracing::warn!(
            "Probe could not geocode '{}': {}",
            address,
            result
                .error()
                .map(ToString::to_string)
                .unwrap_or_default()
        ),
    }
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting geocoding proxy on {} with full config: {:#?}",
            addr,
            config
        );
    } else {
        tracing::info!(
            "Starting geocoding proxy on {} with {} workers (quota {}, window {:?})",
            addr,
            config.num_workers,
            config.quota,
            config.quota_window
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
