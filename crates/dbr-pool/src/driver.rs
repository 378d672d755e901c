use crate::stats::PoolStatsSnapshot;
use async_trait::async_trait;
use dbr_core::DbError;

/// The subset of pool behavior the health checker and pool monitor need: a liveness probe and
/// a stats snapshot. Generalizes `tower-resilience-healthcheck::HealthChecker<T>`'s blanket
/// impl over closures into a trait implemented once for the real `sqlx` pool and once for an
/// in-memory test double, so `PoolMonitor` and `evaluate_health` never need a live Postgres
/// instance to exercise.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    async fn ping(&self) -> Result<(), DbError>;
    fn stats(&self) -> PoolStatsSnapshot;
}

/// The real driver, backed by a `sqlx::PgPool`.
pub struct PgDriver {
    pub(crate) pool: sqlx::PgPool,
}

impl PgDriver {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| DbError::new(dbr_core::DbErrorKind::ConnectionLost, e.to_string()).with_source(e))
    }

    /// `sqlx::PgPool` only exposes the point-in-time `size`/`num_idle`/`options` figures used
    /// below; it has no equivalent of the lifetime counters (`acquire_count`,
    /// `empty_acquire_count`, `canceled_acquire_count`, `new_connections`,
    /// `max_lifetime_destroy_count`, `max_idle_destroy_count`) that `PoolStatsSnapshot` carries
    /// for drivers that do track them. Those fields are left at their `Default` (zero) here,
    /// not because the pool never exhausts or evicts connections, but because `sqlx` doesn't
    /// surface the running totals to read back.
    fn stats(&self) -> PoolStatsSnapshot {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        PoolStatsSnapshot {
            acquired: size.saturating_sub(idle as u32),
            idle,
            constructing: 0,
            total: size,
            max: self.pool.options().get_max_connections(),
            ..Default::default()
        }
    }
}

/// Test double for exercising [`crate::PoolMonitor`] and health-check logic without a live
/// Postgres instance.
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    #[derive(Default)]
    pub struct MockDriver {
        pub ping_ok: AtomicBool,
        pub acquired: AtomicU32,
        pub idle: AtomicU32,
        pub max: AtomicU32,
        pub canceled_acquire_count: AtomicU64,
    }

    impl MockDriver {
        pub fn new() -> Self {
            Self {
                ping_ok: AtomicBool::new(true),
                acquired: AtomicU32::new(0),
                idle: AtomicU32::new(1),
                max: AtomicU32::new(10),
                canceled_acquire_count: AtomicU64::new(0),
            }
        }

        pub fn set_ping_ok(&self, ok: bool) {
            self.ping_ok.store(ok, Ordering::SeqCst);
        }

        pub fn set_acquired(&self, acquired: u32) {
            self.acquired.store(acquired, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Driver for MockDriver {
        async fn ping(&self) -> Result<(), DbError> {
            if self.ping_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DbError::new(
                    dbr_core::DbErrorKind::ConnectionLost,
                    "mock ping failure",
                ))
            }
        }

        fn stats(&self) -> PoolStatsSnapshot {
            PoolStatsSnapshot {
                acquired: self.acquired.load(Ordering::SeqCst),
                idle: self.idle.load(Ordering::SeqCst),
                max: self.max.load(Ordering::SeqCst),
                total: self.acquired.load(Ordering::SeqCst) + self.idle.load(Ordering::SeqCst),
                canceled_acquire_count: self.canceled_acquire_count.load(Ordering::SeqCst),
                ..Default::default()
            }
        }
    }
}
