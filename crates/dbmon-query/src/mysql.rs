use crate::StatsQueries;

/// MySQL query catalog.
///
/// Only the active connections dimension has a query today; the remaining
/// dimensions report as unsupported and the loop skips them.
pub struct MySqlStatsQueries;

impl StatsQueries for MySqlStatsQueries {
    fn active_connections_query(&self) -> Option<&'static str> {
        Some("SHOW STATUS WHERE `variable_name` = 'Threads_connected'")
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
