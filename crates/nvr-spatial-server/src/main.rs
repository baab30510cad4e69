//! NVR spatial tracking server.
//!
//! Hosts the REST API, serves uploaded map images and runs the periodic
//! sweep that expires handoffs and completes stale tracks.
//!
//! Usage:
//!   cargo run -p nvr-spatial-server -- --listen 0.0.0.0:5010 --data-path ./data

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use nvr_spatial_tracking::api::{create_router, ApiConfig, AppState};
use nvr_spatial_tracking::store::MAP_IMAGE_ROUTE;
use nvr_spatial_tracking::{SpatialStore, TrackManager, TrackingConfig};

#[derive(Parser, Debug)]
#[command(name = "nvr-spatial-server", version, about = "NVR cross-camera spatial tracking server")]
struct Args {
    /// Address the HTTP API listens on
    #[arg(long = "listen", env = "SPATIAL_LISTEN_ADDR", default_value = "0.0.0.0:5010")]
    listen_addr: SocketAddr,

    /// Directory holding the database and uploaded map images
    #[arg(long, env = "SPATIAL_DATA_PATH", default_value = "/tmp/nvr-spatial-data")]
    data_path: PathBuf,

    /// Seconds a lost track is kept before it completes
    #[arg(long, default_value = "300")]
    track_ttl_secs: u64,

    /// Seconds between handoff expiry sweeps
    #[arg(long, default_value = "5")]
    sweep_interval_secs: u64,

    /// Largest accepted map image upload, in bytes
    #[arg(long, default_value = "10485760")]
    max_upload_bytes: usize,
}

impl Args {
    fn tracking_config(&self) -> TrackingConfig {
        TrackingConfig::builder()
            .track_ttl_secs(self.track_ttl_secs)
            .sweep_interval_secs(self.sweep_interval_secs)
            .build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();
    info!(version = nvr_spatial_tracking::VERSION, "Starting NVR spatial tracking server");

    let store = SpatialStore::open(&args.data_path)
        .with_context(|| format!("failed to open store in {}", args.data_path.display()))?;
    info!(data_path = %args.data_path.display(), "Spatial store ready");

    let config = args.tracking_config();
    config.validate().context("invalid tracking configuration")?;
    let manager = Arc::new(TrackManager::new(store.clone(), config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(manager.clone().run(shutdown_rx));

    let api_config = ApiConfig {
        max_upload_bytes: args.max_upload_bytes,
        ..ApiConfig::default()
    };
    let mut app: Router = create_router(AppState::with_config(manager.clone(), api_config));
    if let Some(image_root) = store.image_root() {
        std::fs::create_dir_all(&image_root)
            .with_context(|| format!("failed to create {}", image_root.display()))?;
        app = app.nest_service(MAP_IMAGE_ROUTE, ServeDir::new(image_root));
    }
    let app = app.layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    info!("HTTP server listening on {}", args.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    // Receiver may already be gone if the sweeper exited early.
    let _ = shutdown_tx.send(true);
    sweeper.await.context("sweeper task panicked")?;

    let stats = manager.persistence_stats();
    info!(
        writes_ok = stats.writes_ok,
        dropped_writes = stats.dropped_writes,
        "Server stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["nvr-spatial-server"]).unwrap();
        assert_eq!(args.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(args.tracking_config().track_ttl_secs, 300);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "nvr-spatial-server",
            "--listen",
            "127.0.0.1:9000",
            "--sweep-interval-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(args.listen_addr.port(), 9000);
        assert_eq!(args.tracking_config().sweep_interval_secs, 1);
    }
}
