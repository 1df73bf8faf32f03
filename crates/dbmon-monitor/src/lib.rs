//! Per-database monitoring engine.
//!
//! One [`MonitorLoop`] runs per configured database target. Each loop owns
//! its pooled connection exclusively, executes a liveness probe plus the
//! vendor's diagnostic queries every tick, and routes results and errors
//! into the shared [`dbmon_metrics::DatabaseMetrics`] sink. Loops fail
//! independently: a query error becomes a counter increment, a connection
//! failure degrades only the owning loop, and cancellation releases the
//! connection and exits cleanly.

pub mod backend;
pub mod connection;
pub mod monitor;

#[cfg(test)]
mod tests;

pub use backend::{Backend, BackendError, SqlBackend};
pub use connection::ConnectionManager;
pub use monitor::{MonitorLoop, DEFAULT_POLL_INTERVAL, LIVENESS_QUERY};
