use crate::migration::{Migration, MigrationStatus};
use dbr_core::{DbError, DbErrorKind};
use dbr_pool::{DatabasePool, PgDriver};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// Applies/rolls back loaded [`Migration`]s against a `schema_migrations` history table,
/// transactionally, one migration at a time (spec §4.H).
pub struct MigrationRunner {
    pool: Arc<DatabasePool<PgDriver>>,
}

impl MigrationRunner {
    pub fn new(pool: Arc<DatabasePool<PgDriver>>) -> Self {
        Self { pool }
    }

    /// Ensures the `schema_migrations` table (and its `applied_at` index) exist. Idempotent —
    /// safe to call on every startup.
    pub async fn bootstrap(&self) -> Result<(), DbError> {
        let ctx = CancellationToken::new();
        self.pool
            .exec(
                &ctx,
                "CREATE TABLE IF NOT EXISTS schema_migrations ( \
                     version INT PRIMARY KEY, \
                     name TEXT, \
                     applied_at TIMESTAMPTZ DEFAULT now(), \
                     description TEXT \
                 )",
                &[],
            )
            .await?;
        self.pool
            .exec(
                &ctx,
                "CREATE INDEX IF NOT EXISTS schema_migrations_applied_at_idx \
                     ON schema_migrations (applied_at)",
                &[],
            )
            .await?;
        Ok(())
    }

    async fn applied_versions(&self) -> Result<HashMap<u32, chrono::DateTime<chrono::Utc>>, DbError> {
        use sqlx::Row;

        let rows = self
            .pool
            .query(
                &CancellationToken::new(),
                "SELECT version, applied_at FROM schema_migrations",
                &[],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let version: i32 = row.get("version");
                let applied_at: chrono::DateTime<chrono::Utc> = row.get("applied_at");
                (version as u32, applied_at)
            })
            .collect())
    }

    /// Applies every migration in `migrations` not yet recorded in `schema_migrations`, sorted
    /// ascending by version, each inside its own transaction (spec §4.H `Up`). Returns the
    /// versions newly applied. A failure halts the loop; everything applied before the
    /// failing migration remains applied.
    pub async fn up(&self, migrations: &[Migration]) -> Result<Vec<u32>, DbError> {
        self.bootstrap().await?;

        let mut sorted: Vec<&Migration> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        let applied = self.applied_versions().await?;
        let mut newly_applied = Vec::new();

        for migration in sorted {
            if applied.contains_key(&migration.version) {
                continue;
            }

            let mut tx = self.pool.begin().await?;

            if let Err(e) = sqlx::query(&migration.up_sql).execute(&mut *tx).await {
                let _ = tx.rollback().await;
                return Err(DbError::new(
                    DbErrorKind::MigrationSqlFailed,
                    format!("migration {} ({}) failed: {e}", migration.version, migration.name),
                )
                .with_source(e));
            }

            let upsert = sqlx::query(
                "INSERT INTO schema_migrations (version, name, description) VALUES ($1, $2, $3) \
                 ON CONFLICT (version) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
            )
            .bind(migration.version as i32)
            .bind(&migration.name)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await;

            if let Err(e) = upsert {
                let _ = tx.rollback().await;
                return Err(DbError::new(
                    DbErrorKind::MigrationSqlFailed,
                    format!(
                        "recording migration {} ({}) failed: {e}",
                        migration.version, migration.name
                    ),
                )
                .with_source(e));
            }

            tx.commit().await.map_err(|e| {
                DbError::new(DbErrorKind::CommitFailed, e.to_string()).with_source(e)
            })?;

            #[cfg(feature = "tracing")]
            info!(version = migration.version, name = %migration.name, "applied migration");
            #[cfg(feature = "metrics")]
            metrics::counter!(dbr_core::metrics_names::MIGRATIONS_APPLIED_TOTAL).increment(1);

            newly_applied.push(migration.version);
        }

        Ok(newly_applied)
    }

    /// Rolls back the `n` most recently applied migrations, descending by version, each
    /// inside its own transaction (spec §4.H `Down`). Fails if a targeted version has no
    /// loaded migration or no `down_sql`, or if its `schema_migrations` row is already gone.
    pub async fn down(&self, migrations: &[Migration], n: usize) -> Result<Vec<u32>, DbError> {
        let applied = self.applied_versions().await?;
        let mut applied_versions: Vec<u32> = applied.keys().copied().collect();
        applied_versions.sort_unstable_by(|a, b| b.cmp(a));

        let mut rolled_back = Vec::new();

        for version in applied_versions.into_iter().take(n) {
            let migration = migrations.iter().find(|m| m.version == version).ok_or_else(|| {
                DbError::new(
                    DbErrorKind::MigrationMissingSql,
                    format!("no loaded migration for applied version {version}"),
                )
            })?;
            let down_sql = migration.down_sql.as_ref().ok_or_else(|| {
                DbError::new(
                    DbErrorKind::MigrationMissingSql,
                    format!("migration {version} has no down_sql"),
                )
            })?;

            let mut tx = self.pool.begin().await?;

            if let Err(e) = sqlx::query(down_sql).execute(&mut *tx).await {
                let _ = tx.rollback().await;
                return Err(DbError::new(
                    DbErrorKind::MigrationSqlFailed,
                    format!("rolling back migration {version} failed: {e}"),
                )
                .with_source(e));
            }

            let deleted = sqlx::query("DELETE FROM schema_migrations WHERE version = $1")
                .bind(version as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    DbError::new(DbErrorKind::MigrationSqlFailed, e.to_string()).with_source(e)
                })?;

            if deleted.rows_affected() == 0 {
                let _ = tx.rollback().await;
                return Err(DbError::new(
                    DbErrorKind::MigrationRecordMissing,
                    format!("schema_migrations row for version {version} vanished mid-rollback"),
                ));
            }

            tx.commit().await.map_err(|e| {
                DbError::new(DbErrorKind::CommitFailed, e.to_string()).with_source(e)
            })?;

            #[cfg(feature = "tracing")]
            warn!(version, "rolled back migration");

            rolled_back.push(version);
        }

        Ok(rolled_back)
    }

    /// Joins loaded migrations against `schema_migrations` (spec §4.H `Status`).
    pub async fn status(&self, migrations: &[Migration]) -> Result<Vec<MigrationStatus>, DbError> {
        let applied = self.applied_versions().await?;
        let mut sorted: Vec<&Migration> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        Ok(sorted
            .into_iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name.clone(),
                applied: applied.contains_key(&m.version),
                applied_at: applied.get(&m.version).copied(),
            })
            .collect())
    }

    /// Refuses to proceed if any loaded migration is unapplied (spec §4.H startup gate).
    pub async fn require_no_pending(&self, migrations: &[Migration]) -> Result<(), DbError> {
        let status = self.status(migrations).await?;
        let pending: Vec<u32> = status.iter().filter(|s| !s.applied).map(|s| s.version).collect();

        if pending.is_empty() {
            Ok(())
        } else {
            Err(DbError::new(
                DbErrorKind::MigrationRecordMissing,
                format!("pending migrations: {pending:?}"),
            ))
        }
    }
}
