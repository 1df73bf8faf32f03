use crate::backend::Backend;
use crate::connection::ConnectionManager;
use chrono::Utc;
use dbmon_common::types::{DatabaseTarget, TickSummary};
use dbmon_metrics::DatabaseMetrics;
use dbmon_query::{provider_for, Dimension, StatsQueries};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Trivial probe executed at the start of every tick.
pub const LIVENESS_QUERY: &str = "SELECT 1";

/// Interval between monitoring passes unless overridden by configuration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The polling loop for one monitored database.
///
/// Ties together one [`DatabaseTarget`], the vendor's query catalog and the
/// shared metrics sink. Connection handling is isolated per loop: a failed
/// open degrades only this database (logged, counted, retried on the poll
/// interval) and query failures inside a tick become counter increments
/// while the tick runs to completion.
pub struct MonitorLoop {
    target: DatabaseTarget,
    queries: &'static dyn StatsQueries,
    metrics: Arc<DatabaseMetrics>,
    interval: Duration,
    shutdown: CancellationToken,
    ticks: Option<mpsc::UnboundedSender<TickSummary>>,
}

impl MonitorLoop {
    pub fn new(
        target: DatabaseTarget,
        metrics: Arc<DatabaseMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        let queries = provider_for(target.vendor);
        Self {
            target,
            queries,
            metrics,
            interval: DEFAULT_POLL_INTERVAL,
            shutdown,
            ticks: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Substitute the query catalog. Production code keeps the vendor's
    /// catalog from [`provider_for`]; tests inject fakes here.
    pub fn with_queries(mut self, queries: &'static dyn StatsQueries) -> Self {
        self.queries = queries;
        self
    }

    /// Attach an observable feed of per-tick summaries. Sends are
    /// fire-and-forget on an unbounded channel: a missing or slow consumer
    /// can never stall the loop.
    pub fn with_tick_feed(mut self, ticks: mpsc::UnboundedSender<TickSummary>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Run until cancelled, opening the connection first.
    ///
    /// Open failures are retried on the poll interval with the connection
    /// error counter incremented each attempt, so a single unreachable
    /// database never takes down monitoring of the others.
    pub async fn run(self) {
        let backend = loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            match ConnectionManager::open(&self.target).await {
                Ok(backend) => break backend,
                Err(e) => {
                    tracing::warn!(
                        db = %self.target.name,
                        error = %e,
                        retry_secs = self.interval.as_secs(),
                        "Failed to open database connection"
                    );
                    self.metrics.inc_connection_errors(&self.target.name);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        _ = sleep(self.interval) => {}
                    }
                }
            }
        };

        self.run_with_backend(Arc::new(backend)).await;
    }

    /// Run the tick loop over an already-open backend until cancelled.
    /// The backend is closed exactly once on the way out.
    pub async fn run_with_backend(self, backend: Arc<dyn Backend>) {
        tracing::info!(
            db = %self.target.name,
            vendor = %self.target.vendor,
            interval_secs = self.interval.as_secs(),
            "Monitoring started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let summary = self.tick(backend.as_ref()).await;
            tracing::debug!(
                db = %summary.db_name,
                liveness_ok = summary.liveness_ok,
                collected = summary.dimensions_collected,
                failed = summary.dimensions_failed,
                "Tick completed"
            );
            if let Some(ticks) = &self.ticks {
                let _ = ticks.send(summary);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        backend.close().await;
        tracing::info!(db = %self.target.name, "Monitoring stopped");
    }

    /// One complete monitoring pass.
    ///
    /// Dimension failures are isolated: every supplied query runs whether or
    /// not the previous one failed, and a failure only increments the
    /// connection error counter while the gauge keeps its prior value.
    pub async fn tick(&self, backend: &dyn Backend) -> TickSummary {
        let db_name = self.target.name.as_str();

        let started = std::time::Instant::now();
        let liveness_ok = match backend.execute(LIVENESS_QUERY).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(db = %db_name, error = %e, "Liveness probe failed");
                self.metrics.inc_query_errors(db_name);
                false
            }
        };
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.record_query_duration(db_name, elapsed);
        self.metrics
            .record_individual_query_time(db_name, LIVENESS_QUERY, elapsed);

        let mut collected = 0;
        let mut failed = 0;
        for dimension in Dimension::ALL {
            let Some(sql) = self.queries.query(dimension) else {
                continue;
            };
            match backend.fetch_scalar(sql).await {
                Ok(value) => {
                    self.apply_dimension(dimension, value);
                    collected += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        db = %db_name,
                        dimension = %dimension,
                        error = %e,
                        "Diagnostic query failed"
                    );
                    self.metrics.inc_connection_errors(db_name);
                    failed += 1;
                }
            }
        }

        // One monitoring pass counts as one transaction.
        self.metrics.inc_transaction_count(db_name);

        TickSummary {
            db_name: db_name.to_string(),
            liveness_ok,
            dimensions_collected: collected,
            dimensions_failed: failed,
            completed_at: Utc::now(),
        }
    }

    fn apply_dimension(&self, dimension: Dimension, value: f64) {
        let db_name = self.target.name.as_str();
        match dimension {
            Dimension::ActiveConnections => self.metrics.set_total_active_queries(db_name, value),
            Dimension::CacheUsage => self.metrics.set_cache_usage(db_name, value),
            Dimension::DiskIo => self.metrics.set_disk_io(db_name, value),
            Dimension::NetworkTraffic => self.metrics.set_network_traffic(db_name, value),
            Dimension::ConnectionPoolSize => self.metrics.set_connection_pool_size(db_name, value),
            Dimension::DatabaseSize => self.metrics.set_database_size(db_name, value),
        }
    }
}
