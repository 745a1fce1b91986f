//! tracklog service - background location tracker.
//!
//! Run with: `cargo run -p tracklog-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use tracklog_service::providers::{
    FixedLocationProvider, Geocoder, HttpGeocoder, LocationProvider, NoopGeocoder,
    NullLocationProvider,
};
use tracklog_service::{api, monitor, retention, sync, AppState, Config, Sampler};
use tracklog_store::Store;

/// tracklog service - background location tracker with offline-first sync.
#[derive(Parser, Debug)]
#[command(name = "tracklog-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Subject identifier (overrides config).
    #[arg(long)]
    subject: Option<String>,

    /// Remote sink base URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,

    /// Do not start tracking at launch (it can still be started over HTTP).
    #[arg(long)]
    no_tracker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracklog_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if let Some(subject) = args.subject {
        config.tracking.subject_id = subject;
    }
    if let Some(base_url) = args.base_url {
        config.tracking.base_url = Some(base_url);
    }
    config.validate()?;

    // Open the database
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    // Wire up the provider seams
    let provider = build_provider(&config);
    let geocoder = build_geocoder(&config)?;

    let bind = config.server.bind.clone();
    let state = AppState::new(store, config, provider, geocoder)?;

    // Retention runs for the life of the process
    retention::start(Arc::clone(&state));

    // Start tracking
    if !args.no_tracker {
        let sampler = Sampler::new(Arc::clone(&state));
        sampler.start().await;
        monitor::start(Arc::clone(&state)).await;
        sync::start_sweep(Arc::clone(&state)).await;
    } else {
        info!("Tracking disabled at launch");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Parse bind address
    let addr: SocketAddr = bind.parse()?;

    info!("Starting control API on {}", addr);

    // Run the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_provider(config: &Config) -> Arc<dyn LocationProvider> {
    match &config.tracking.fixed_position {
        Some(position) => Arc::new(FixedLocationProvider::new(
            position.latitude,
            position.longitude,
        )),
        None => {
            info!("No fix source configured; capture ticks will be skipped");
            Arc::new(NullLocationProvider)
        }
    }
}

fn build_geocoder(config: &Config) -> Result<Arc<dyn Geocoder>, reqwest::Error> {
    match &config.tracking.geocoder_url {
        Some(url) => Ok(Arc::new(HttpGeocoder::new(
            url.clone(),
            std::time::Duration::from_secs(config.tracking.http_timeout),
        )?)),
        None => Ok(Arc::new(NoopGeocoder)),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal");
}
