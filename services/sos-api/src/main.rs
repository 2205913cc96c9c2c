//! SOS API service.
//!
//! HTTP server implementing the OGC Sensor Observation Service 1.0.0/2.0.0
//! over KVP, POX, SOAP, JSON and REST bindings.

use anyhow::{Context, Result};
use axum::extract::Extension;
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sos_api::{routes, AppState};

#[derive(Parser, Debug)]
#[command(name = "sos-api")]
#[command(about = "OGC Sensor Observation Service server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "SOS_LISTEN_ADDR")]
    listen: String,

    /// Path to the YAML configuration
    #[arg(short, long, default_value = "config/sos.yaml", env = "SOS_CONFIG")]
    config: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "SOS_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!(config = %args.config, "Starting SOS API server");

    let state = Arc::new(AppState::load(&args.config)?);
    let url_pattern = state.config.read().await.rest.url_pattern.clone();

    let app = routes::build_router(state, &url_pattern).layer(Extension(prometheus_handle));

    let addr: SocketAddr = args.listen.parse().context("Invalid listen address")?;
    info!(address = %addr, rest = %url_pattern, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
