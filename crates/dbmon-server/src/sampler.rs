use dbmon_metrics::DatabaseMetrics;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Samples the collector process itself.
///
/// CPU and memory are process-wide gauges, not per-database state, so they
/// are refreshed here on their own interval instead of inside every
/// database's tick. Sampling reads local OS state only; it always succeeds
/// and never blocks on an unavailable metric source.
pub struct SystemSampler {
    metrics: Arc<DatabaseMetrics>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SystemSampler {
    pub fn new(
        metrics: Arc<DatabaseMetrics>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            metrics,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot resolve current pid, process metrics disabled");
                return;
            }
        };

        let mut system = System::new();
        let mut tick = interval(self.interval);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tick.tick() => {
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    if let Some(process) = system.process(pid) {
                        self.metrics.set_memory_usage(process.memory() as f64);
                        self.metrics.set_cpu_usage(f64::from(process.cpu_usage()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sampler_populates_process_gauges_and_honors_cancellation() {
        let metrics = Arc::new(DatabaseMetrics::new().unwrap());
        let shutdown = CancellationToken::new();
        let sampler = SystemSampler::new(
            metrics.clone(),
            Duration::from_millis(5),
            shutdown.clone(),
        );
        let handle = tokio::spawn(sampler.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let output = metrics.encode().unwrap();
        assert!(output.contains("app_memory_usage_bytes"));
        assert!(output.contains("app_cpu_usage_percentage"));
    }
}
