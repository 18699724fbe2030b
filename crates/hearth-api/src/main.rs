//! # hearth-api: Binary Entry Point
//!
//! Starts the HTTP server, the outbox relay, and the stale-booking sweep.
//! Configuration comes from the environment; see [`hearth_api::config`].

use hearth_api::config::LogFormat;
use hearth_api::{AppConfig, AppState};
use hearth_care::CareConfig;
use hearth_core::Actor;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let care = match &config.policy_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading care policy");
            CareConfig::load(path)?
        }
        None => CareConfig::default(),
    };

    let metrics = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::new(config.clone(), &care)?.with_metrics(metrics);
    if config.auth_secret.is_none() {
        tracing::warn!("HEARTH_AUTH_SECRET not set; every request acts as hotel staff");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = tokio::spawn(state.runtime.relay(care.relay.clone()).run(shutdown_rx.clone()));
    let sweep = tokio::spawn(sweep_stale(
        state.runtime.clone(),
        config.sweep_interval,
        shutdown_rx,
    ));

    let app = hearth_api::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Hearth API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shutting down background tasks");
    let _ = shutdown_tx.send(true);
    sweep.await?;
    let stats = relay.await?;
    tracing::info!(
        persisted = stats.persisted,
        delivered = stats.delivered,
        failed = stats.failed,
        "relay drained"
    );
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Cancel pending bookings whose assignment deadline has passed, every
/// `interval`, until shutdown.
async fn sweep_stale(
    runtime: hearth_care::CareRuntime,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match runtime.bookings().expire_stale(&Actor::system()) {
                    Ok(expired) if !expired.is_empty() => {
                        tracing::info!(count = expired.len(), "expired stale bookings");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "stale booking sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
