//! itinerant-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Wire the generation, place search and geocoding collaborators.
//! 4. Create the session store and start the expiry sweeper.
//! 5. Build the Axum router and serve with graceful shutdown.
//! 6. Stop the sweeper.

mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use itinerant_core::services::{
    Geocoder, GenerationService, GoogleGeocoder, GooglePlaces, OpenAiGenerator, PlacesLookup,
};
use itinerant_core::{Enricher, MemorySessionStore, SessionSweeper, Workflow};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ITINERANT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "itinerant-server starting");

    // ── 3. Collaborators ───────────────────────────────────────────────────────
    let generator: Arc<dyn GenerationService> = Arc::new(OpenAiGenerator::new(cfg.generation())?);
    if cfg.llm_api_key.is_none() {
        warn!("ITINERANT_LLM_API_KEY is not set; generation steps will fail");
    }
    info!(model = %cfg.llm_model, base_url = %cfg.llm_base_url, "generation service configured");

    let enricher = match &cfg.google_maps_api_key {
        Some(key) => {
            let client = reqwest_client()?;
            let places: Arc<dyn PlacesLookup> =
                Arc::new(GooglePlaces::with_client(key.clone(), client.clone()));
            let geocoder: Arc<dyn Geocoder> = Arc::new(GoogleGeocoder::with_client(key.clone(), client));
            info!("place search and geocoding enabled");
            Enricher::new(Some(places), Some(geocoder))
        }
        None => {
            warn!("GOOGLE_MAPS_API_KEY is not set; places will stay unresolved");
            Enricher::disabled()
        }
    }
    .with_batch_size(cfg.enrich_batch_size);

    // ── 4. Session store + sweeper ─────────────────────────────────────────────
    let store = Arc::new(MemorySessionStore::new(cfg.session_ttl));
    let sweeper = SessionSweeper::start(Arc::clone(&store), cfg.sweep_interval);
    info!(
        ttl_secs = cfg.session_ttl.as_secs(),
        sweep_secs = cfg.sweep_interval.as_secs(),
        "session store ready"
    );

    let workflow = Workflow::new(store, generator, enricher).with_config(cfg.workflow());
    let state = Arc::new(AppState::new(cfg.clone(), workflow));

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 6. Background tasks ────────────────────────────────────────────────────
    sweeper.stop().await;

    info!("itinerant-server stopped");
    Ok(())
}

/// One HTTP client shared by both lookup tiers.
fn reqwest_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?)
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
