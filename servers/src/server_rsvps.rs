//! # RSVP Aggregation Server
//!
//! HTTP front-end that answers `POST /query` with the RSVP state of a batch
//! of meetup.com events plus a deduplicated attendance summary.
//!
//! Startup loads the configuration (defaults, `server_rsvps.conf`,
//! environment, CLI), installs logging, loads the allow-list once (fatal on
//! failure) and then serves until Ctrl-C or SIGTERM. Shutdown drains
//! in-flight requests before the background tasks are stopped.

use anyhow::{Context, Result};
use lib_rsvps::{
    AllowlistRefresher, AllowlistStore, HttpSourceFetcher, MeetupClient, ResultCache, RsvpAggregator,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod rsvps_logic;
use rsvps_logic::{config, logger, routes, state};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    let _log_guard = logger::setup_logging(config.log_dir.as_deref(), config.effective_log_level())?;

    let (settings, server) = config.into_settings().context("invalid configuration")?;
    info!(
        sources = settings.allowlist.source_urls.len(),
        cache_capacity = settings.cache.capacity,
        upcoming_ttl = ?settings.cache.ttl.upcoming(),
        past_ttl = ?settings.cache.ttl.past(),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();

    let fetcher = Arc::new(HttpSourceFetcher::new(&settings.allowlist)?);
    let allowlist = Arc::new(AllowlistStore::new(settings.allowlist.source_urls.clone(), fetcher));
    let refresher = AllowlistRefresher::start(
        allowlist.clone(),
        settings.allowlist.refresh_interval,
        cancel.clone(),
    )
    .await
    .context("failed to load the allow-list")?;

    let client = Arc::new(MeetupClient::new(&settings.meetup)?);
    let cache = Arc::new(ResultCache::with_capacity(settings.cache.capacity)?);
    let janitor_period = settings.cache.ttl.upcoming().min(settings.cache.ttl.past());
    let janitor = state::spawn_cache_janitor(cache.clone(), janitor_period, cancel.clone());

    let aggregator = Arc::new(RsvpAggregator::new(client, allowlist, cache, settings.cache.ttl));
    let app_state = state::AppState::new(aggregator, settings.request_timeout, cancel.clone());
    let app = routes::router(app_state, routes::cors(server.allowed_origins));

    let listener = TcpListener::bind(server.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", server.http_addr))?;
    info!("Listening on http://{}", server.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks once the last request is answered
    refresher.shutdown().await;
    cancel.cancel();
    if let Err(e) = janitor.await {
        warn!(error = %e, "cache janitor task failed");
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
