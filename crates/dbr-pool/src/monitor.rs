use crate::driver::Driver;
use crate::pool::DatabasePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use metrics::gauge;
#[cfg(feature = "tracing")]
use tracing::warn;

/// Periodically samples a pool's stats and publishes them as gauges, raising warnings when
/// utilization crosses configurable thresholds (spec §4.F).
///
/// Grounded on `tower-resilience-healthcheck`'s timer-driven `tokio::select!` checker loop,
/// repointed at a [`crate::stats::PoolStatsSnapshot`] instead of a single resource's health
/// status.
pub struct PoolMonitor<D: Driver> {
    pool: Arc<DatabasePool<D>>,
    period: Duration,
    warn_utilization: f64,
    critical_utilization: f64,
}

impl<D: Driver> PoolMonitor<D> {
    pub fn new(pool: Arc<DatabasePool<D>>) -> Self {
        let period = pool.config().health_check_period;
        Self {
            pool,
            period,
            warn_utilization: 0.8,
            critical_utilization: 0.95,
        }
    }

    pub fn warn_utilization(mut self, threshold: f64) -> Self {
        self.warn_utilization = threshold;
        self
    }

    pub fn critical_utilization(mut self, threshold: f64) -> Self {
        self.critical_utilization = threshold;
        self
    }

    /// Runs the sampling loop until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = interval.tick() => self.sample(),
                _ = token.cancelled() => return,
            }
        }
    }

    fn sample(&self) {
        let stats = self.pool.stats();
        let utilization = stats.utilization();

        #[cfg(feature = "metrics")]
        {
            gauge!(dbr_core::metrics_names::POOL_ACQUIRED, "pool" => self.pool.name().to_string())
                .set(stats.acquired as f64);
            gauge!(dbr_core::metrics_names::POOL_IDLE, "pool" => self.pool.name().to_string())
                .set(stats.idle as f64);
            gauge!(dbr_core::metrics_names::POOL_MAX, "pool" => self.pool.name().to_string())
                .set(stats.max as f64);
            gauge!(dbr_core::metrics_names::POOL_TOTAL, "pool" => self.pool.name().to_string())
                .set(stats.total as f64);
            gauge!(dbr_core::metrics_names::POOL_UTILIZATION_PERCENT, "pool" => self.pool.name().to_string())
                .set(utilization * 100.0);
        }

        if utilization >= self.critical_utilization {
            #[cfg(feature = "tracing")]
            warn!(pool = %self.pool.name(), utilization, "pool utilization critical");
        } else if utilization >= self.warn_utilization {
            #[cfg(feature = "tracing")]
            warn!(pool = %self.pool.name(), utilization, "pool utilization elevated");
        }
    }
}
