use async_trait::async_trait;
use dbmon_common::types::Vendor;
use sqlx::{AnyPool, Row};

/// Errors produced by the connection layer and diagnostic queries.
///
/// # Examples
///
/// ```
/// use dbmon_common::types::Vendor;
/// use dbmon_monitor::BackendError;
///
/// let err = BackendError::NoDriver(Vendor::Oracle);
/// assert!(err.to_string().contains("oracle"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// An underlying driver error from `sqlx` (connect, execute, decode).
    #[error("driver error: {0}")]
    Driver(#[from] sqlx::Error),

    /// A diagnostic query produced no rows where one scalar was expected.
    #[error("query returned no rows")]
    EmptyResult,

    /// No SQL driver is available for the target's vendor.
    #[error("no SQL driver available for vendor {0}")]
    NoDriver(Vendor),

    /// The target resolves to no usable connection string.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// A live handle to one monitored database.
///
/// Exactly one backend exists per running monitor loop and is owned by it;
/// nothing is shared across loops. Implementations must be safe to call
/// from the owning task only, but `Send + Sync` so the loop can hold them
/// across await points.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run a statement for its side effect only (the liveness probe).
    async fn execute(&self, sql: &str) -> Result<(), BackendError>;

    /// Run a query expected to yield a single numeric value in the first
    /// column of the first row.
    async fn fetch_scalar(&self, sql: &str) -> Result<f64, BackendError>;

    /// Release all pooled resources. Must be invoked exactly once per
    /// opened backend, on every loop exit path.
    async fn close(&self);
}

/// Production backend over a pooled `sqlx` connection.
pub struct SqlBackend {
    pool: AnyPool,
}

impl SqlBackend {
    pub(crate) fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for SqlBackend {
    async fn execute(&self, sql: &str) -> Result<(), BackendError> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_scalar(&self, sql: &str) -> Result<f64, BackendError> {
        let row = sqlx::query(sql)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BackendError::EmptyResult)?;

        // Counts come back as integers, sizes sometimes as doubles; accept
        // either in the first column.
        if let Ok(value) = row.try_get::<i64, _>(0) {
            return Ok(value as f64);
        }
        let value: f64 = row.try_get(0)?;
        Ok(value)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
