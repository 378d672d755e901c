use crate::config::PoolConfig;
use crate::driver::{Driver, PgDriver};
use crate::params::SqlParam;
use crate::stats::{evaluate_health, HealthCheckResult, PoolStatsSnapshot};
use dbr_core::{DbError, DbErrorKind};
use dbr_slowlog::{SlowQueryLog, SlowQueryRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use metrics::histogram;
#[cfg(feature = "tracing")]
use tracing::warn;

/// Canceled-acquire count above which [`DatabasePool::health_check`] raises a warning.
const CANCELED_ACQUIRE_WARN_THRESHOLD: u64 = 100;

/// Connection pool facade (spec §4.E). Generic over [`Driver`] so the health-check and
/// monitoring surface can be exercised against `driver::testing::MockDriver`; SQL execution
/// methods (`exec`, `query_one`, `begin`, `acquire`) are only available on the
/// `sqlx`-backed `DatabasePool<PgDriver>`.
pub struct DatabasePool<D: Driver = PgDriver> {
    driver: D,
    config: PoolConfig,
    slow_log: Arc<SlowQueryLog>,
    name: String,
}

impl<D: Driver> DatabasePool<D> {
    pub fn from_driver(driver: D, config: PoolConfig, name: impl Into<String>) -> Self {
        let slow_log = Arc::new(SlowQueryLog::new(100));
        Self {
            driver,
            config,
            slow_log,
            name: name.into(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slow_query_log(&self) -> &Arc<SlowQueryLog> {
        &self.slow_log
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.driver.ping().await
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.driver.stats()
    }

    /// Healthy iff the ping succeeds AND `(acquired + idle) > 0`; warns on exhaustion or an
    /// elevated canceled-acquire count (spec §4.E `HealthCheck`).
    pub async fn health_check(&self) -> HealthCheckResult {
        let ping_ok = self.ping().await.is_ok();
        evaluate_health(&self.stats(), ping_ok, CANCELED_ACQUIRE_WARN_THRESHOLD)
    }

    /// Records a completed call's duration: observes it into the query-duration histogram and,
    /// if it exceeds the configured threshold, files it with the slow-query log and emits a
    /// warning log line (spec §4.E "per-call side effects").
    fn observe(&self, operation: &'static str, sql: &str, duration: Duration, arg_count: usize) {
        let query_type = sql
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();

        #[cfg(feature = "metrics")]
        histogram!(
            dbr_core::metrics_names::QUERY_DURATION_SECONDS,
            "query_type" => query_type.clone(),
            "operation" => operation,
        )
        .record(duration.as_secs_f64());

        if self.config.log_slow_queries && duration >= self.config.slow_query_threshold {
            #[cfg(feature = "tracing")]
            warn!(pool = %self.name, operation, duration_ms = duration.as_millis(), "slow query");

            self.slow_log.record(SlowQueryRecord {
                query: sanitize(sql),
                duration,
                recorded_at: chrono::Utc::now(),
                query_type,
                arg_count,
            });
        }
    }
}

/// Strips everything past the first 200 characters so literal values embedded by callers that
/// forgot to parameterize a query don't end up verbatim in the slow-query log.
fn sanitize(sql: &str) -> String {
    let sql = sql.trim();
    if sql.len() > 200 {
        format!("{}...", &sql[..200])
    } else {
        sql.to_string()
    }
}

impl DatabasePool<PgDriver> {
    /// Connects using [`PoolConfig`], mirroring `PgPoolOptions` wiring used for CockroachDB:
    /// acquire timeout, max lifetime with jitter, idle timeout, min/max connections, and
    /// `test_before_acquire`.
    pub async fn connect(url: &str, config: PoolConfig, name: impl Into<String>) -> Result<Self, DbError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(config.connect_timeout)
            .max_lifetime(config.conn_max_lifetime)
            .max_lifetime_jitter(config.conn_max_lifetime_jitter)
            .idle_timeout(Some(config.conn_max_idle_time))
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .test_before_acquire(config.test_before_acquire)
            .connect(url)
            .await
            .map_err(|e| {
                DbError::new(DbErrorKind::ConnectFailed, e.to_string()).with_source(e)
            })?;

        Ok(Self::from_driver(PgDriver::new(pool), config, name))
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.driver.pool()
    }

    /// Builds a bound `sqlx` query from `sql` and `args`, in order.
    fn bind_args<'q>(sql: &'q str, args: &'q [SqlParam]) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = arg.bind(query);
        }
        query
    }

    /// Executes a statement that doesn't return rows, returning the affected row count.
    ///
    /// Races the execution against `ctx`: if it fires first, the call returns
    /// [`DbError::acquire_canceled`] without waiting for the statement to finish.
    pub async fn exec(&self, ctx: &CancellationToken, sql: &str, args: &[SqlParam]) -> Result<u64, DbError> {
        let started = Instant::now();
        let query = Self::bind_args(sql, args);

        let result = tokio::select! {
            res = query.execute(self.pool()) => res,
            _ = ctx.cancelled() => return Err(DbError::acquire_canceled()),
        };

        self.observe("exec", sql, started.elapsed(), args.len());
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))
    }

    /// Runs a query expected to return at most one row.
    pub async fn query_one(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<sqlx::postgres::PgRow, DbError> {
        use sqlx::Row as _;
        let started = Instant::now();
        let query = Self::bind_args(sql, args);

        let result = tokio::select! {
            res = query.fetch_one(self.pool()) => res,
            _ = ctx.cancelled() => return Err(DbError::acquire_canceled()),
        };

        self.observe("query_one", sql, started.elapsed(), args.len());
        let row = result
            .map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))?;
        let _ = row.columns();
        Ok(row)
    }

    /// Runs a query, returning every row.
    pub async fn query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<sqlx::postgres::PgRow>, DbError> {
        let started = Instant::now();
        let query = Self::bind_args(sql, args);

        let result = tokio::select! {
            res = query.fetch_all(self.pool()) => res,
            _ = ctx.cancelled() => return Err(DbError::acquire_canceled()),
        };

        self.observe("query", sql, started.elapsed(), args.len());
        result.map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))
    }

    /// Begins a transaction. Callers use `dbr-transaction`'s `TransactionManager` for the
    /// higher-level begin/commit/rollback lifecycle; this is the low-level primitive it's
    /// built on.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, DbError> {
        self.pool()
            .begin()
            .await
            .map_err(|e| DbError::new(DbErrorKind::ConnectFailed, e.to_string()).with_source(e))
    }

    /// Acquires a single connection for exclusive use; the caller releases it on drop.
    pub async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, DbError> {
        self.pool()
            .acquire()
            .await
            .map_err(|e| DbError::new(DbErrorKind::PoolExhausted, e.to_string()).with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::MockDriver;

    fn pool_with_mock() -> DatabasePool<MockDriver> {
        DatabasePool::from_driver(MockDriver::new(), PoolConfig::default(), "test")
    }

    #[tokio::test]
    async fn healthy_when_ping_ok_and_connections_available() {
        let pool = pool_with_mock();
        let result = pool.health_check().await;
        assert!(result.healthy);
    }

    #[tokio::test]
    async fn unhealthy_when_ping_fails() {
        let mock = MockDriver::new();
        mock.set_ping_ok(false);
        let pool = DatabasePool::from_driver(mock, PoolConfig::default(), "test");

        let result = pool.health_check().await;
        assert!(!result.healthy);
    }

    #[tokio::test]
    async fn unhealthy_when_no_connections_available() {
        let mock = MockDriver::new();
        mock.set_acquired(0);
        mock.idle.store(0, std::sync::atomic::Ordering::SeqCst);
        let pool = DatabasePool::from_driver(mock, PoolConfig::default(), "test");

        let result = pool.health_check().await;
        assert!(!result.healthy);
    }

    #[test]
    fn sanitize_truncates_long_queries() {
        let sql = "a".repeat(300);
        let sanitized = sanitize(&sql);
        assert!(sanitized.ends_with("..."));
        assert_eq!(sanitized.len(), 203);
    }

    #[test]
    fn sanitize_leaves_short_queries_untouched() {
        assert_eq!(sanitize("select 1"), "select 1");
    }
}
