use crate::StatsQueries;

/// PostgreSQL query catalog.
pub struct PostgresStatsQueries;

impl StatsQueries for PostgresStatsQueries {
    fn active_connections_query(&self) -> Option<&'static str> {
        Some("SELECT count(*) FROM pg_stat_activity")
    }

    fn cache_usage_query(&self) -> Option<&'static str> {
        None
    }

    fn connection_pool_size_query(&self) -> Option<&'static str> {
        None
    }

    fn disk_io_query(&self) -> Option<&'static str> {
        None
    }

    fn network_traffic_query(&self) -> Option<&'static str> {
        None
    }

    fn database_size_query(&self) -> Option<&'static str> {
        None
    }
}
