//! Per-vendor diagnostic query catalogs.
//!
//! Each supported database vendor supplies its own SQL text for the six
//! monitored dimensions through a [`StatsQueries`] implementation. The
//! monitoring loop stays vendor-agnostic: it asks the provider for a query,
//! runs it, and records the result. A provider returning `None` for a
//! dimension means the dimension is not implemented for that vendor and is
//! skipped without error.

pub mod mysql;
pub mod oracle;
pub mod postgres;

use dbmon_common::types::Vendor;

/// One of the six diagnostic measurements collected per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    ActiveConnections,
    CacheUsage,
    ConnectionPoolSize,
    DiskIo,
    NetworkTraffic,
    DatabaseSize,
}

impl Dimension {
    /// All dimensions, in the order the monitoring loop collects them.
    pub const ALL: [Dimension; 6] = [
        Dimension::ActiveConnections,
        Dimension::CacheUsage,
        Dimension::DiskIo,
        Dimension::NetworkTraffic,
        Dimension::ConnectionPoolSize,
        Dimension::DatabaseSize,
    ];
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dimension::ActiveConnections => "active_connections",
            Dimension::CacheUsage => "cache_usage",
            Dimension::ConnectionPoolSize => "connection_pool_size",
            Dimension::DiskIo => "disk_io",
            Dimension::NetworkTraffic => "network_traffic",
            Dimension::DatabaseSize => "database_size",
        };
        write!(f, "{name}")
    }
}

/// Vendor-specific catalog of diagnostic queries.
///
/// Implementations are stateless lookups: no I/O, no side effects. `None`
/// means the vendor has no query for that dimension.
pub trait StatsQueries: Send + Sync {
    fn active_connections_query(&self) -> Option<&'static str>;
    fn cache_usage_query(&self) -> Option<&'static str>;
    fn connection_pool_size_query(&self) -> Option<&'static str>;
    fn disk_io_query(&self) -> Option<&'static str>;
    fn network_traffic_query(&self) -> Option<&'static str>;
    fn database_size_query(&self) -> Option<&'static str>;

    /// Look up the query for a dimension.
    fn query(&self, dimension: Dimension) -> Option<&'static str> {
        match dimension {
            Dimension::ActiveConnections => self.active_connections_query(),
            Dimension::CacheUsage => self.cache_usage_query(),
            Dimension::ConnectionPoolSize => self.connection_pool_size_query(),
            Dimension::DiskIo => self.disk_io_query(),
            Dimension::NetworkTraffic => self.network_traffic_query(),
            Dimension::DatabaseSize => self.database_size_query(),
        }
    }
}

/// Select the query catalog for a vendor.
///
/// Total over [`Vendor`]: every vendor value maps to exactly one provider,
/// enforced by the exhaustive match. Unsupported vendors cannot reach this
/// point; they are rejected when configuration is deserialized.
pub fn provider_for(vendor: Vendor) -> &'static dyn StatsQueries {
    match vendor {
        Vendor::MySql => &mysql::MySqlStatsQueries,
        Vendor::Postgres => &postgres::PostgresStatsQueries,
        Vendor::Oracle => &oracle::OracleStatsQueries,
    }
}
