//! Prometheus metrics sink shared by every monitoring loop.
//!
//! [`DatabaseMetrics`] owns a private [`Registry`] and exposes a record-only
//! API: loops write through it, the HTTP exposition layer reads from it via
//! [`DatabaseMetrics::encode`]. All metric identities (names, label schemas)
//! are fixed at construction. Every write is safe under concurrent callers;
//! the prometheus primitives serialize per-series updates internally, and a
//! write for an unseen `db_name` creates that label series on first use.

use anyhow::Result;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Metrics registry for the collector, scraped by Prometheus.
#[derive(Clone)]
pub struct DatabaseMetrics {
    registry: Registry,
    process: ProcessMetrics,
    queries: QueryMetrics,
    errors: ErrorCounters,
    gauges: DimensionGauges,
}

impl DatabaseMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let process = ProcessMetrics::register(&registry)?;
        let queries = QueryMetrics::register(&registry)?;
        let errors = ErrorCounters::register(&registry)?;
        let gauges = DimensionGauges::register(&registry)?;

        Ok(Self {
            registry,
            process,
            queries,
            errors,
            gauges,
        })
    }

    /// Observe one liveness probe duration into the per-database
    /// distribution.
    pub fn record_query_duration(&self, db_name: &str, seconds: f64) {
        self.queries
            .durations
            .with_label_values(&[db_name])
            .observe(seconds);
    }

    /// Observe a single query's duration, labeled by its text. Callers must
    /// keep the query label set small; the sink does not guard cardinality.
    pub fn record_individual_query_time(&self, db_name: &str, query: &str, seconds: f64) {
        self.queries
            .individual
            .with_label_values(&[db_name, query])
            .observe(seconds);
    }

    pub fn set_avg_query_duration(&self, db_name: &str, seconds: f64) {
        self.queries
            .avg_duration
            .with_label_values(&[db_name])
            .set(seconds);
    }

    pub fn set_cpu_usage(&self, percentage: f64) {
        self.process.cpu_usage.set(percentage);
    }

    pub fn set_memory_usage(&self, bytes: f64) {
        self.process.memory_usage.set(bytes);
    }

    pub fn set_total_active_queries(&self, db_name: &str, count: f64) {
        self.gauges
            .active_queries
            .with_label_values(&[db_name])
            .set(count);
    }

    pub fn set_cache_usage(&self, db_name: &str, bytes: f64) {
        self.gauges
            .cache_usage
            .with_label_values(&[db_name])
            .set(bytes);
    }

    pub fn set_disk_io(&self, db_name: &str, bytes: f64) {
        self.gauges.disk_io.with_label_values(&[db_name]).set(bytes);
    }

    pub fn set_network_traffic(&self, db_name: &str, bytes: f64) {
        self.gauges
            .network_traffic
            .with_label_values(&[db_name])
            .set(bytes);
    }

    pub fn set_connection_pool_size(&self, db_name: &str, size: f64) {
        self.gauges
            .connection_pool_size
            .with_label_values(&[db_name])
            .set(size);
    }

    pub fn set_database_size(&self, db_name: &str, bytes: f64) {
        self.gauges
            .database_size
            .with_label_values(&[db_name])
            .set(bytes);
    }

    pub fn inc_connection_errors(&self, db_name: &str) {
        self.errors
            .connection_errors
            .with_label_values(&[db_name])
            .inc();
    }

    pub fn inc_query_errors(&self, db_name: &str) {
        self.errors.query_errors.with_label_values(&[db_name]).inc();
    }

    pub fn inc_transaction_count(&self, db_name: &str) {
        self.errors.transactions.with_label_values(&[db_name]).inc();
    }

    /// Render the current state in the Prometheus text exposition format.
    /// Read-only: scraping never mutates metric state.
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Current value of a per-database counter, for tests and diagnostics.
    pub fn connection_errors(&self, db_name: &str) -> u64 {
        self.errors
            .connection_errors
            .with_label_values(&[db_name])
            .get()
    }

    pub fn query_errors(&self, db_name: &str) -> u64 {
        self.errors.query_errors.with_label_values(&[db_name]).get()
    }

    pub fn transaction_count(&self, db_name: &str) -> u64 {
        self.errors.transactions.with_label_values(&[db_name]).get()
    }

    pub fn total_active_queries(&self, db_name: &str) -> f64 {
        self.gauges
            .active_queries
            .with_label_values(&[db_name])
            .get()
    }
}

/// Process-wide gauges, not labeled per database.
#[derive(Clone)]
struct ProcessMetrics {
    cpu_usage: Gauge,
    memory_usage: Gauge,
}

impl ProcessMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let cpu_usage = Gauge::with_opts(Opts::new(
            "app_cpu_usage_percentage",
            "CPU usage of the application.",
        ))?;
        registry.register(Box::new(cpu_usage.clone()))?;

        let memory_usage = Gauge::with_opts(Opts::new(
            "app_memory_usage_bytes",
            "Memory usage of the application.",
        ))?;
        registry.register(Box::new(memory_usage.clone()))?;

        Ok(Self {
            cpu_usage,
            memory_usage,
        })
    }
}

#[derive(Clone)]
struct QueryMetrics {
    durations: HistogramVec,
    individual: HistogramVec,
    avg_duration: GaugeVec,
}

impl QueryMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let durations = HistogramVec::new(
            HistogramOpts::new("db_query_duration_seconds", "Duration of database queries."),
            &["db_name"],
        )?;
        registry.register(Box::new(durations.clone()))?;

        let individual = HistogramVec::new(
            HistogramOpts::new(
                "db_individual_query_duration_seconds",
                "Execution times for individual queries.",
            ),
            &["db_name", "query"],
        )?;
        registry.register(Box::new(individual.clone()))?;

        let avg_duration = GaugeVec::new(
            Opts::new(
                "db_avg_query_duration_seconds",
                "Average duration of database queries.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(avg_duration.clone()))?;

        Ok(Self {
            durations,
            individual,
            avg_duration,
        })
    }
}

#[derive(Clone)]
struct ErrorCounters {
    connection_errors: IntCounterVec,
    query_errors: IntCounterVec,
    transactions: IntCounterVec,
}

impl ErrorCounters {
    fn register(registry: &Registry) -> Result<Self> {
        let connection_errors = IntCounterVec::new(
            Opts::new(
                "db_connection_errors_total",
                "Total number of database connection errors.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(connection_errors.clone()))?;

        let query_errors = IntCounterVec::new(
            Opts::new(
                "db_query_errors_total",
                "Total number of database query errors.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(query_errors.clone()))?;

        let transactions = IntCounterVec::new(
            Opts::new(
                "db_transaction_count_total",
                "Total number of database transactions.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(transactions.clone()))?;

        Ok(Self {
            connection_errors,
            query_errors,
            transactions,
        })
    }
}

#[derive(Clone)]
struct DimensionGauges {
    active_queries: GaugeVec,
    cache_usage: GaugeVec,
    disk_io: GaugeVec,
    network_traffic: GaugeVec,
    connection_pool_size: GaugeVec,
    database_size: GaugeVec,
}

impl DimensionGauges {
    fn register(registry: &Registry) -> Result<Self> {
        let active_queries = GaugeVec::new(
            Opts::new("db_total_active_queries", "Total number of active queries."),
            &["db_name"],
        )?;
        registry.register(Box::new(active_queries.clone()))?;

        let cache_usage = GaugeVec::new(
            Opts::new("db_cache_usage_bytes", "Cache usage of the database."),
            &["db_name"],
        )?;
        registry.register(Box::new(cache_usage.clone()))?;

        let disk_io = GaugeVec::new(
            Opts::new("db_disk_io_bytes", "Disk I/O of the database."),
            &["db_name"],
        )?;
        registry.register(Box::new(disk_io.clone()))?;

        let network_traffic = GaugeVec::new(
            Opts::new(
                "db_network_traffic_bytes",
                "Network traffic of the database.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(network_traffic.clone()))?;

        let connection_pool_size = GaugeVec::new(
            Opts::new(
                "db_connection_pool_size",
                "Connection pool size of the database.",
            ),
            &["db_name"],
        )?;
        registry.register(Box::new(connection_pool_size.clone()))?;

        let database_size = GaugeVec::new(
            Opts::new("db_size_bytes", "Total size of the database."),
            &["db_name"],
        )?;
        registry.register(Box::new(database_size.clone()))?;

        Ok(Self {
            active_queries,
            cache_usage,
            disk_io,
            network_traffic,
            connection_pool_size,
            database_size,
        })
    }
}
