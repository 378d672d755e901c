use crate::config::DatabaseConfig;
use dbr_core::DbError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "pool")]
use dbr_pool::{DatabasePool, PgDriver, PoolMonitor, PoolStatsSnapshot, SqlParam};

#[cfg(feature = "transaction")]
use dbr_transaction::TransactionManager;

#[cfg(feature = "migrate")]
use dbr_migrate::{Migration, MigrationRunner, MigrationStatus};

#[cfg(feature = "cache")]
use dbr_cache::InMemoryCache;

#[cfg(feature = "router")]
use dbr_router::ReplicaRouter;

/// The facade (spec §2): wires the connection pool, transaction manager, migration runner,
/// query cache, and replica router together behind one handle, the way
/// `demos/database_client.rs` wires the teacher's retry and circuit-breaker layers around a
/// database client.
///
/// Built up from whichever optional components are enabled via Cargo features; `pool` is the
/// only hard requirement (transaction, migrate, and router all pull it in transitively).
pub struct Database {
    #[cfg(feature = "pool")]
    pool: Arc<DatabasePool<PgDriver>>,
    #[cfg(feature = "pool")]
    monitor: Arc<PoolMonitor<PgDriver>>,
    #[cfg(feature = "transaction")]
    transactions: TransactionManager,
    #[cfg(feature = "migrate")]
    migrations: MigrationRunner,
    #[cfg(feature = "cache")]
    cache: Arc<InMemoryCache<serde_json::Value>>,
    #[cfg(feature = "cache")]
    cache_ttl: Duration,
    #[cfg(feature = "router")]
    router: Option<Arc<ReplicaRouter>>,
}

impl Database {
    /// Connects to the primary (and, if `router` is enabled and configured, every replica).
    #[cfg(feature = "pool")]
    pub async fn connect(config: DatabaseConfig) -> Result<Self, DbError> {
        let pool = Arc::new(
            DatabasePool::connect(&config.primary_url, config.pool.clone(), "primary").await?,
        );

        let monitor = Arc::new(
            PoolMonitor::new(Arc::clone(&pool))
                .warn_utilization(config.pool_monitor_warn_utilization)
                .critical_utilization(config.pool_monitor_critical_utilization),
        );

        #[cfg(feature = "router")]
        let router = if config.replica_urls.is_empty() {
            None
        } else {
            let mut replicas = Vec::with_capacity(config.replica_urls.len());
            for (i, url) in config.replica_urls.iter().enumerate() {
                replicas.push(Arc::new(
                    DatabasePool::connect(url, config.pool.clone(), format!("replica-{i}"))
                        .await?,
                ));
            }
            Some(Arc::new(ReplicaRouter::new(
                Arc::clone(&pool),
                replicas,
                config.router.clone(),
            )))
        };

        Ok(Self {
            #[cfg(feature = "transaction")]
            transactions: TransactionManager::new(Arc::clone(&pool)),
            #[cfg(feature = "migrate")]
            migrations: MigrationRunner::new(Arc::clone(&pool)),
            #[cfg(feature = "cache")]
            cache: Arc::new(InMemoryCache::with_sweep_interval(config.cache_sweep_interval)),
            #[cfg(feature = "cache")]
            cache_ttl: config.cache_default_ttl,
            #[cfg(feature = "router")]
            router,
            pool,
            monitor,
        })
    }

    #[cfg(feature = "pool")]
    pub fn pool(&self) -> &Arc<DatabasePool<PgDriver>> {
        &self.pool
    }

    #[cfg(feature = "pool")]
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    #[cfg(feature = "transaction")]
    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    #[cfg(feature = "migrate")]
    pub fn migrations(&self) -> &MigrationRunner {
        &self.migrations
    }

    #[cfg(feature = "migrate")]
    pub async fn migrate_up(&self, migrations: &[Migration]) -> Result<Vec<u32>, DbError> {
        self.migrations.bootstrap().await?;
        self.migrations.up(migrations).await
    }

    #[cfg(feature = "migrate")]
    pub async fn migrate_status(
        &self,
        migrations: &[Migration],
    ) -> Result<Vec<MigrationStatus>, DbError> {
        self.migrations.status(migrations).await
    }

    #[cfg(feature = "cache")]
    pub fn cache(&self) -> &Arc<InMemoryCache<serde_json::Value>> {
        &self.cache
    }

    /// Routes a read through the replica router if one is configured and at least one replica
    /// exists, otherwise reads from the primary directly. Returns each row as a JSON object
    /// keyed by column name, the shape [`Self::cache`] can store results in.
    ///
    /// When `cache` is enabled, a deterministic `SELECT` (spec §4.I: no `now()`,
    /// `current_timestamp`, `random()`, locking clause, or explicit transaction marker) is
    /// served from cache on a hit and populated on a miss, keyed on `(normalized_sql,
    /// argument_tuple)`.
    #[cfg(feature = "pool")]
    pub async fn query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<serde_json::Value>, DbError> {
        self.cached_query(ctx, sql, args).await
    }

    #[cfg(feature = "router")]
    async fn dispatch_query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<sqlx::postgres::PgRow>, DbError> {
        match &self.router {
            Some(router) => router.query(ctx, sql, args).await,
            None => self.pool.query(ctx, sql, args).await,
        }
    }

    #[cfg(all(feature = "pool", not(feature = "router")))]
    async fn dispatch_query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<sqlx::postgres::PgRow>, DbError> {
        self.pool.query(ctx, sql, args).await
    }

    #[cfg(feature = "cache")]
    async fn cached_query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<serde_json::Value>, DbError> {
        let key = cache_key_for_read(sql, args);

        if let Some(key) = &key {
            if let Some(serde_json::Value::Array(rows)) = self.cache.get(key).await {
                return Ok(rows);
            }
        }

        let rows: Vec<serde_json::Value> = self
            .dispatch_query(ctx, sql, args)
            .await?
            .iter()
            .map(pg_row_to_json)
            .collect();

        if let Some(key) = key {
            self.cache
                .set(&key, serde_json::Value::Array(rows.clone()), self.cache_ttl)
                .await;
        }

        Ok(rows)
    }

    #[cfg(all(feature = "pool", not(feature = "cache")))]
    async fn cached_query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<serde_json::Value>, DbError> {
        Ok(self
            .dispatch_query(ctx, sql, args)
            .await?
            .iter()
            .map(pg_row_to_json)
            .collect())
    }

    /// Writes always go to the primary (spec §4.J); when a router is configured, routed
    /// through it so write retries use its policy, otherwise issued directly. On success,
    /// invalidates cached reads of the affected table (spec §4.I "on write queries... issues
    /// `Delete` or `InvalidatePattern` on keys matching affected tables").
    #[cfg(feature = "pool")]
    pub async fn exec(&self, ctx: &CancellationToken, sql: &str, args: &[SqlParam]) -> Result<u64, DbError> {
        let affected = self.dispatch_exec(ctx, sql, args).await?;
        #[cfg(feature = "cache")]
        self.invalidate_for_write(sql).await;
        Ok(affected)
    }

    #[cfg(feature = "router")]
    async fn dispatch_exec(&self, ctx: &CancellationToken, sql: &str, args: &[SqlParam]) -> Result<u64, DbError> {
        match &self.router {
            Some(router) => router.exec(ctx, sql, args).await,
            None => self.pool.exec(ctx, sql, args).await,
        }
    }

    #[cfg(all(feature = "pool", not(feature = "router")))]
    async fn dispatch_exec(&self, ctx: &CancellationToken, sql: &str, args: &[SqlParam]) -> Result<u64, DbError> {
        self.pool.exec(ctx, sql, args).await
    }

    #[cfg(feature = "cache")]
    async fn invalidate_for_write(&self, sql: &str) {
        if let Some(table) = affected_table(sql) {
            self.cache.invalidate_pattern(&format!("{table}:*")).await;
        }
    }

    /// Spawns every long-running background task this instance owns (pool monitor, cache
    /// sweeper, replica health loop) and runs them until `token` is cancelled (spec §9
    /// "Concurrency primitives": timer-driven tasks with no shared mutable state beyond their
    /// own observation surfaces).
    pub async fn run_background_tasks(self: &Arc<Self>, token: CancellationToken) {
        #[cfg(feature = "pool")]
        let monitor_task = {
            let monitor = Arc::clone(&self.monitor);
            let token = token.clone();
            tokio::spawn(async move { monitor.run(token).await })
        };

        #[cfg(feature = "cache")]
        let sweeper_task = {
            let cache = Arc::clone(&self.cache);
            let token = token.clone();
            tokio::spawn(async move { cache.run_sweeper(token).await })
        };

        #[cfg(feature = "router")]
        let health_task = self.router.clone().map(|router| {
            let token = token.clone();
            tokio::spawn(async move { router.run_health_loop(token).await })
        });

        #[cfg(feature = "pool")]
        let _ = monitor_task.await;
        #[cfg(feature = "cache")]
        let _ = sweeper_task.await;
        #[cfg(feature = "router")]
        if let Some(task) = health_task {
            let _ = task.await;
        }
    }
}

/// Converts a row into a JSON object keyed by column name, decoding each value by its
/// Postgres type name. Columns of a type this doesn't recognize fall back to a text decode;
/// a column that's neither gets stored as `null` rather than failing the whole row.
#[cfg(feature = "pool")]
fn pg_row_to_json(row: &sqlx::postgres::PgRow) -> serde_json::Value {
    use sqlx::{Column, Row, TypeInfo};

    let mut map = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = pg_column_to_json(row, index, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    serde_json::Value::Object(map)
}

#[cfg(feature = "pool")]
fn pg_column_to_json(row: &sqlx::postgres::PgRow, index: usize, type_name: &str) -> serde_json::Value {
    use sqlx::Row;

    match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).ok().flatten().map(serde_json::Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index).ok().flatten().map(|v| serde_json::Value::from(v as i64)),
        "INT4" => row.try_get::<Option<i32>, _>(index).ok().flatten().map(|v| serde_json::Value::from(v as i64)),
        "INT8" => row.try_get::<Option<i64>, _>(index).ok().flatten().map(serde_json::Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index).ok().flatten().map(|v| serde_json::Value::from(v as f64)),
        "FLOAT8" | "NUMERIC" => row.try_get::<Option<f64>, _>(index).ok().flatten().map(serde_json::Value::from),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::from(v.to_string())),
        "TIMESTAMPTZ" | "TIMESTAMP" => row
            .try_get::<Option<sqlx::types::chrono::DateTime<sqlx::types::chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::from(v.to_rfc3339())),
        "JSON" | "JSONB" => row.try_get::<Option<serde_json::Value>, _>(index).ok().flatten(),
        _ => row.try_get::<Option<String>, _>(index).ok().flatten().map(serde_json::Value::from),
    }
    .unwrap_or(serde_json::Value::Null)
}

/// SQL fragments that make a `SELECT` non-deterministic or otherwise unsafe to cache: wall-clock
/// reads, randomness, row locks, and explicit transaction control (spec §4.I).
#[cfg(feature = "cache")]
const NON_DETERMINISTIC_TOKENS: &[&str] = &[
    "now()",
    "current_timestamp",
    "random()",
    "for update",
    "for share",
    "for no key update",
    "for key share",
    "begin",
    "commit",
    "rollback",
];

/// Whether `sql` is a plain, deterministic `SELECT` safe to serve from cache.
#[cfg(feature = "cache")]
fn is_cacheable_read(sql: &str) -> bool {
    let lower = sql.to_ascii_lowercase();
    let trimmed = lower.trim_start();
    trimmed.starts_with("select")
        && !NON_DETERMINISTIC_TOKENS.iter().any(|token| lower.contains(token))
}

/// The cache key for a read: `{table}:{normalized_sql}|{args}`, a deterministic function of
/// `(normalized_sql, argument_tuple)` per spec §4.I. Returns `None` when the statement isn't
/// cacheable or no table can be identified — without a table, [`Database::invalidate_for_write`]
/// would have nothing to invalidate the entry against, so it's safer not to cache it at all.
#[cfg(feature = "cache")]
fn cache_key_for_read(sql: &str, args: &[SqlParam]) -> Option<String> {
    if !is_cacheable_read(sql) {
        return None;
    }
    let table = primary_table(sql)?;
    let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
    Some(format!("{table}:{normalized}|{args:?}"))
}

/// Extracts the table name following `from`, `insert into`, or `update`. Handles the common
/// single-table case only; joins and subqueries fall back to `None` (not cached).
#[cfg(feature = "cache")]
fn primary_table(sql: &str) -> Option<String> {
    let lower = sql.to_ascii_lowercase();

    let rest = if let Some(rest) = lower.strip_prefix("insert into ") {
        rest
    } else if let Some(rest) = lower.trim_start().strip_prefix("update ") {
        rest
    } else {
        let idx = lower.find(" from ")?;
        &lower[idx + 6..]
    };

    rest.split_whitespace()
        .next()
        .map(|table| table.trim_matches(|c: char| c == '"' || c == ';').to_string())
}

#[cfg(feature = "cache")]
fn affected_table(sql: &str) -> Option<String> {
    primary_table(sql)
}

#[cfg(all(test, feature = "cache"))]
mod cache_key_tests {
    use super::*;

    #[test]
    fn select_without_non_deterministic_tokens_is_cacheable() {
        assert!(is_cacheable_read("SELECT id, name FROM widgets WHERE id = $1"));
    }

    #[test]
    fn select_with_now_is_not_cacheable() {
        assert!(!is_cacheable_read("SELECT id FROM widgets WHERE created_at > now()"));
    }

    #[test]
    fn select_for_update_is_not_cacheable() {
        assert!(!is_cacheable_read("SELECT id FROM widgets WHERE id = $1 FOR UPDATE"));
    }

    #[test]
    fn non_select_is_not_cacheable() {
        assert!(!is_cacheable_read("INSERT INTO widgets (name) VALUES ($1)"));
    }

    #[test]
    fn table_extracted_from_select_from_clause() {
        assert_eq!(
            primary_table("SELECT * FROM widgets WHERE id = $1"),
            Some("widgets".to_string())
        );
    }

    #[test]
    fn table_extracted_from_insert_and_update() {
        assert_eq!(
            primary_table("INSERT INTO widgets (name) VALUES ($1)"),
            Some("widgets".to_string())
        );
        assert_eq!(
            primary_table("UPDATE widgets SET name = $1 WHERE id = $2"),
            Some("widgets".to_string())
        );
    }

    #[test]
    fn cache_key_includes_table_and_args() {
        let key = cache_key_for_read("SELECT * FROM widgets WHERE id = $1", &[SqlParam::I32(1)])
            .expect("cacheable");
        assert!(key.starts_with("widgets:"));
        assert!(key.contains("I32(1)"));
    }
}
