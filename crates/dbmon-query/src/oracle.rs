use crate::StatsQueries;

/// Oracle query catalog.
pub struct OracleStatsQueries;

impl StatsQueries for OracleStatsQueries {
    fn active_connections_query(&self) -> Option<&'static str> {
        Some("SELECT count(*) FROM v$session")
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
