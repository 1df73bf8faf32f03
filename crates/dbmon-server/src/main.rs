use anyhow::Result;
use chrono::Utc;
use dbmon_metrics::DatabaseMetrics;
use dbmon_monitor::MonitorLoop;
use dbmon_server::app::{self, AppState};
use dbmon_server::config::ServerConfig;
use dbmon_server::sampler::SystemSampler;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;

    tracing::info!(
        http_port = config.http_port,
        databases = config.databases.len(),
        poll_interval_secs = config.poll_interval_secs,
        "dbmon-server starting"
    );
    if config.databases.is_empty() {
        tracing::warn!("No databases configured, serving process metrics only");
    }

    let metrics = Arc::new(DatabaseMetrics::new()?);
    let shutdown = CancellationToken::new();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let mut loop_handles = Vec::new();
    for target in config.databases.clone() {
        let monitor = MonitorLoop::new(target, metrics.clone(), shutdown.child_token())
            .with_interval(Duration::from_secs(config.poll_interval_secs))
            .with_tick_feed(tick_tx.clone());
        loop_handles.push(tokio::spawn(monitor.run()));
    }
    drop(tick_tx);

    // Keep the tick feed drained; summaries are observability, not control
    // flow, and no loop ever blocks on this channel.
    let drain_handle = tokio::spawn(async move {
        while let Some(summary) = tick_rx.recv().await {
            tracing::debug!(
                db = %summary.db_name,
                liveness_ok = summary.liveness_ok,
                collected = summary.dimensions_collected,
                failed = summary.dimensions_failed,
                "Tick observed"
            );
        }
    });

    let sampler = SystemSampler::new(
        metrics.clone(),
        Duration::from_secs(config.system_sample_interval_secs),
        shutdown.child_token(),
    );
    let sampler_handle = tokio::spawn(sampler.run());

    let state = AppState {
        metrics: metrics.clone(),
        start_time: Utc::now(),
        database_count: config.databases.len(),
    };
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let http_server = axum::serve(listener, app::build_http_app(state));
    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    shutdown.cancel();
    for handle in loop_handles {
        let _ = handle.await;
    }
    let _ = sampler_handle.await;
    drain_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
