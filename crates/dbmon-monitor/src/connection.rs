use crate::backend::{BackendError, SqlBackend};
use dbmon_common::types::{DatabaseTarget, Vendor};
use sqlx::any::AnyPoolOptions;
use std::sync::Once;
use std::time::Duration;

static INSTALL_DRIVERS: Once = Once::new();

/// Owns the open/close lifecycle of one pooled connection per target.
///
/// Pool limits are applied atomically at open time. Opening verifies the
/// connection by acquiring once; a failure here is reported to the caller,
/// which decides whether to retry (the monitor loop retries on its poll
/// interval) rather than aborting the process.
pub struct ConnectionManager;

impl ConnectionManager {
    pub async fn open(target: &DatabaseTarget) -> Result<SqlBackend, BackendError> {
        // sqlx ships no Oracle driver. The vendor stays a first-class enum
        // member with a full query catalog; its targets surface here and
        // the owning loop degrades instead of connecting.
        if target.vendor == Vendor::Oracle {
            return Err(BackendError::NoDriver(target.vendor));
        }

        let url = target.connection_url().ok_or_else(|| {
            BackendError::InvalidTarget(format!(
                "target '{}' has neither dsn nor connection params",
                target.name
            ))
        })?;

        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new()
            .max_connections(target.pool.max_open_conns)
            .min_connections(target.pool.max_idle_conns)
            .max_lifetime(Duration::from_secs(target.pool.conn_max_lifetime_mins * 60))
            .connect(&url)
            .await?;

        tracing::info!(db = %target.name, vendor = %target.vendor, "Connected to database");
        Ok(SqlBackend::new(pool))
    }
}
