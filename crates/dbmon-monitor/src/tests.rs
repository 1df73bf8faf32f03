use crate::backend::{Backend, BackendError};
use crate::monitor::MonitorLoop;
use async_trait::async_trait;
use dbmon_common::types::{DatabaseTarget, PoolLimits, Vendor};
use dbmon_metrics::DatabaseMetrics;
use dbmon_query::StatsQueries;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn make_target(name: &str, vendor: Vendor) -> DatabaseTarget {
    DatabaseTarget {
        name: name.to_string(),
        vendor,
        dsn: Some(format!("{}://app@localhost/{name}", vendor.url_scheme())),
        params: None,
        pool: PoolLimits::default(),
    }
}

fn make_loop(name: &str, metrics: &Arc<DatabaseMetrics>) -> MonitorLoop {
    MonitorLoop::new(
        make_target(name, Vendor::Postgres),
        metrics.clone(),
        CancellationToken::new(),
    )
    .with_interval(Duration::from_millis(5))
}

/// In-memory backend with scripted responses per query text.
struct FakeBackend {
    scalars: HashMap<&'static str, f64>,
    failing: HashSet<&'static str>,
    fail_execute: bool,
    seen: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            scalars: HashMap::new(),
            failing: HashSet::new(),
            fail_execute: false,
            seen: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn with_scalar(mut self, sql: &'static str, value: f64) -> Self {
        self.scalars.insert(sql, value);
        self
    }

    fn with_failing(mut self, sql: &'static str) -> Self {
        self.failing.insert(sql);
        self
    }

    fn with_failing_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    fn seen_queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn execute(&self, sql: &str) -> Result<(), BackendError> {
        self.seen.lock().unwrap().push(sql.to_string());
        if self.fail_execute {
            return Err(BackendError::EmptyResult);
        }
        Ok(())
    }

    async fn fetch_scalar(&self, sql: &str) -> Result<f64, BackendError> {
        self.seen.lock().unwrap().push(sql.to_string());
        if self.failing.contains(sql) {
            return Err(BackendError::EmptyResult);
        }
        self.scalars
            .get(sql)
            .copied()
            .ok_or(BackendError::EmptyResult)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Catalog supplying a query for every dimension.
struct AllDimensions;

impl StatsQueries for AllDimensions {
    fn active_connections_query(&self) -> Option<&'static str> {
        Some("SELECT active")
    }
    fn cache_usage_query(&self) -> Option<&'static str> {
        Some("SELECT cache")
    }
    fn connection_pool_size_query(&self) -> Option<&'static str> {
        Some("SELECT pool")
    }
    fn disk_io_query(&self) -> Option<&'static str> {
        Some("SELECT disk")
    }
    fn network_traffic_query(&self) -> Option<&'static str> {
        Some("SELECT net")
    }
    fn database_size_query(&self) -> Option<&'static str> {
        Some("SELECT size")
    }
}

static ALL_DIMENSIONS: AllDimensions = AllDimensions;

/// Catalog where connection pool size is an unsupported dimension.
struct NoPoolDimension;

impl StatsQueries for NoPoolDimension {
    fn active_connections_query(&self) -> Option<&'static str> {
        Some("SELECT active")
    }
    fn cache_usage_query(&self) -> Option<&'static str> {
        Some("SELECT cache")
    }
    fn connection_pool_size_query(&self) -> Option<&'static str> {
        None
    }
    fn disk_io_query(&self) -> Option<&'static str> {
        Some("SELECT disk")
    }
    fn network_traffic_query(&self) -> Option<&'static str> {
        Some("SELECT net")
    }
    fn database_size_query(&self) -> Option<&'static str> {
        Some("SELECT size")
    }
}

static NO_POOL_DIMENSION: NoPoolDimension = NoPoolDimension;

#[tokio::test]
async fn failing_liveness_probe_increments_query_errors_only() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let monitor = make_loop("orders", &metrics);
    let backend = FakeBackend::new()
        .with_failing_execute()
        .with_scalar("SELECT count(*) FROM pg_stat_activity", 7.0);

    let summary = monitor.tick(&backend).await;

    assert!(!summary.liveness_ok);
    assert_eq!(metrics.query_errors("orders"), 1);
    assert_eq!(metrics.connection_errors("orders"), 0);
    assert_eq!(metrics.transaction_count("orders"), 1);
    // The probe failure does not stop the rest of the tick.
    assert_eq!(metrics.total_active_queries("orders"), 7.0);
}

#[tokio::test]
async fn probe_duration_lands_in_both_histograms() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let monitor = make_loop("orders", &metrics);
    let backend = FakeBackend::new().with_scalar("SELECT count(*) FROM pg_stat_activity", 1.0);

    monitor.tick(&backend).await;

    let output = metrics.encode().unwrap();
    assert!(output.contains("db_query_duration_seconds_count{db_name=\"orders\"} 1"));
    assert!(output.contains(
        "db_individual_query_duration_seconds_count{db_name=\"orders\",query=\"SELECT 1\"} 1"
    ));
}

#[tokio::test]
async fn failing_diagnostic_query_keeps_prior_gauge_value() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let monitor = make_loop("orders", &metrics).with_queries(&ALL_DIMENSIONS);

    let healthy = FakeBackend::new()
        .with_scalar("SELECT active", 5.0)
        .with_scalar("SELECT cache", 100.0)
        .with_scalar("SELECT pool", 10.0)
        .with_scalar("SELECT disk", 1.0)
        .with_scalar("SELECT net", 2.0)
        .with_scalar("SELECT size", 3.0);
    monitor.tick(&healthy).await;
    assert_eq!(metrics.total_active_queries("orders"), 5.0);
    assert_eq!(metrics.connection_errors("orders"), 0);

    let degraded = FakeBackend::new()
        .with_failing("SELECT active")
        .with_scalar("SELECT cache", 100.0)
        .with_scalar("SELECT pool", 10.0)
        .with_scalar("SELECT disk", 1.0)
        .with_scalar("SELECT net", 2.0)
        .with_scalar("SELECT size", 3.0);
    monitor.tick(&degraded).await;

    // Set-on-success: the gauge still shows the last good value.
    assert_eq!(metrics.total_active_queries("orders"), 5.0);
    assert_eq!(metrics.connection_errors("orders"), 1);
    assert_eq!(metrics.query_errors("orders"), 0);
}

#[tokio::test]
async fn transaction_count_increments_once_per_tick_regardless_of_failures() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let monitor = make_loop("orders", &metrics).with_queries(&ALL_DIMENSIONS);
    let backend = FakeBackend::new()
        .with_failing_execute()
        .with_failing("SELECT active")
        .with_failing("SELECT cache")
        .with_failing("SELECT pool")
        .with_failing("SELECT disk")
        .with_failing("SELECT net")
        .with_failing("SELECT size");

    monitor.tick(&backend).await;
    monitor.tick(&backend).await;

    assert_eq!(metrics.transaction_count("orders"), 2);
    assert_eq!(metrics.query_errors("orders"), 2);
    assert_eq!(metrics.connection_errors("orders"), 12);
}

#[tokio::test]
async fn unsupported_dimensions_are_skipped_without_error() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    // The stock Postgres catalog only implements active connections.
    let monitor = make_loop("orders", &metrics);
    let backend = FakeBackend::new().with_scalar("SELECT count(*) FROM pg_stat_activity", 3.0);

    let summary = monitor.tick(&backend).await;

    assert_eq!(summary.dimensions_collected, 1);
    assert_eq!(summary.dimensions_failed, 0);
    assert_eq!(metrics.connection_errors("orders"), 0);
    assert_eq!(
        backend.seen_queries(),
        vec![
            "SELECT 1".to_string(),
            "SELECT count(*) FROM pg_stat_activity".to_string(),
        ],
        "skipped dimensions must not reach the backend"
    );
}

#[tokio::test]
async fn orders_scenario_one_tick() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let monitor = make_loop("orders", &metrics).with_queries(&NO_POOL_DIMENSION);
    let backend = FakeBackend::new()
        .with_scalar("SELECT active", 5.0)
        .with_failing("SELECT cache")
        .with_failing("SELECT disk")
        .with_failing("SELECT net")
        .with_failing("SELECT size");

    let summary = monitor.tick(&backend).await;

    assert!(summary.liveness_ok);
    assert_eq!(metrics.total_active_queries("orders"), 5.0);
    assert_eq!(metrics.connection_errors("orders"), 4);
    assert_eq!(metrics.query_errors("orders"), 0);
    assert_eq!(metrics.transaction_count("orders"), 1);
}

#[tokio::test]
async fn concurrent_loops_keep_the_shared_sink_consistent() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let shutdown = CancellationToken::new();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let names = ["alpha", "beta", "gamma", "delta"];
    let mut handles = Vec::new();
    for (i, name) in names.into_iter().enumerate() {
        let monitor = MonitorLoop::new(
            make_target(name, Vendor::Postgres),
            metrics.clone(),
            shutdown.child_token(),
        )
        .with_interval(Duration::from_millis(5))
        .with_tick_feed(tick_tx.clone());
        let backend: Arc<dyn Backend> = Arc::new(
            FakeBackend::new().with_scalar("SELECT count(*) FROM pg_stat_activity", i as f64),
        );
        handles.push(tokio::spawn(monitor.run_with_backend(backend)));
    }
    drop(tick_tx);

    // Wait until every database has completed at least one tick.
    let mut completed: HashSet<String> = HashSet::new();
    while completed.len() < names.len() {
        let summary = tick_rx.recv().await.expect("tick feed closed early");
        completed.insert(summary.db_name);
    }
    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    let output = metrics.encode().unwrap();
    for (i, name) in names.into_iter().enumerate() {
        assert_eq!(metrics.total_active_queries(name), i as f64);
        assert!(metrics.transaction_count(name) >= 1);
        assert!(output.contains(&format!("db_total_active_queries{{db_name=\"{name}\"}}")));
    }
    let series = output
        .lines()
        .filter(|l| l.starts_with("db_total_active_queries{"))
        .count();
    assert_eq!(series, names.len(), "one series per database, no extras");
}

#[tokio::test]
async fn cancellation_closes_the_backend_and_stops_the_loop() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let shutdown = CancellationToken::new();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let monitor = MonitorLoop::new(
        make_target("orders", Vendor::Postgres),
        metrics.clone(),
        shutdown.clone(),
    )
    .with_interval(Duration::from_secs(3600))
    .with_tick_feed(tick_tx);

    let backend =
        Arc::new(FakeBackend::new().with_scalar("SELECT count(*) FROM pg_stat_activity", 1.0));
    let loop_backend: Arc<dyn Backend> = backend.clone();
    let handle = tokio::spawn(monitor.run_with_backend(loop_backend));

    tick_rx.recv().await.expect("first tick should complete");
    shutdown.cancel();
    handle.await.unwrap();

    assert!(
        backend.closed.load(Ordering::SeqCst),
        "loop must release its connection on the way out"
    );
}

#[tokio::test]
async fn open_failure_degrades_only_the_owning_loop() {
    let metrics = Arc::new(DatabaseMetrics::new().unwrap());
    let shutdown = CancellationToken::new();

    // No sqlx driver exists for Oracle, so open fails without touching the
    // network and the loop keeps retrying instead of aborting.
    let monitor = MonitorLoop::new(
        make_target("legacy", Vendor::Oracle),
        metrics.clone(),
        shutdown.clone(),
    )
    .with_interval(Duration::from_millis(5));
    let handle = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(40)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert!(metrics.connection_errors("legacy") >= 1);
    assert_eq!(metrics.transaction_count("legacy"), 0, "no tick ever ran");
}
