use crate::events::TransactionEvent;
use crate::options::TransactionOptions;
use dbr_backoff::{BackoffStrategy, FixedBackoff};
use dbr_classify::{Classifiable, RetryOnPolicy};
use dbr_core::events::EventListeners;
use dbr_core::{DbError, DbErrorKind};
use dbr_pool::{DatabasePool, PgDriver};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A boxed, `Send` future borrowing a transaction for `'c`. [`TransactionManager::with_options`]
/// calls `f` once per attempt, so `f` must be re-callable (`Fn`, not `FnOnce`) against a fresh
/// `&mut Transaction` each time; boxing the future is what lets the callback's lifetime vary
/// per call without a higher-ranked `Fn` trait bound fighting the borrow checker.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'c>>;

/// Only the `retry_on.deadlock` class is ever retried by the transaction manager (spec §4.G);
/// it covers both `RetryableDeadlock` and `RetryableSerialization`, per
/// [`dbr_classify::RetryTag::retryable_under`].
const RETRY_ON: RetryOnPolicy = RetryOnPolicy {
    timeout: false,
    connection_loss: false,
    deadlock: true,
    query_cancel: false,
};

/// Begin/commit/rollback lifecycle manager with isolation control, timeout, panic safety,
/// nested savepoints, and retry on deadlock/serialization failure (spec §4.G).
pub struct TransactionManager {
    pool: Arc<DatabasePool<PgDriver>>,
    name: String,
    event_listeners: EventListeners<TransactionEvent>,
}

impl TransactionManager {
    pub fn new(pool: Arc<DatabasePool<PgDriver>>) -> Self {
        Self {
            pool,
            name: String::from("default"),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on_event<F>(&mut self, listener: F)
    where
        F: Fn(&TransactionEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(dbr_core::events::FnListener::new(listener));
    }

    /// `WithTransaction(ctx, fn)`: default options.
    pub async fn with_transaction<F, T>(&self, ctx: &CancellationToken, f: F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        self.with_options(ctx, TransactionOptions::default(), f).await
    }

    /// `ReadOnly(ctx, fn)`: `RepeatableRead`, `ReadOnly`.
    pub async fn read_only<F, T>(&self, ctx: &CancellationToken, f: F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        self.with_options(ctx, TransactionOptions::read_only(), f).await
    }

    /// `Write(ctx, fn)`: `ReadCommitted`, 10s timeout.
    pub async fn write<F, T>(&self, ctx: &CancellationToken, f: F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        self.with_options(ctx, TransactionOptions::write(), f).await
    }

    /// `Batch(ctx, batch_size, fn)`: `ReadCommitted`, 5 minute timeout. `batch_size` is handed
    /// straight through to `f` on every attempt.
    pub async fn batch<F, T>(&self, ctx: &CancellationToken, batch_size: usize, f: F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>, usize) -> TxFuture<'c, T>,
    {
        self.with_options(ctx, TransactionOptions::batch(), move |tx| f(tx, batch_size))
            .await
    }

    /// `WithOptions(ctx, options, fn)`: the execution contract from spec §4.G.
    ///
    /// Derives a child of `ctx` bounded by `options.timeout` (step 1 of the contract): a timer
    /// task cancels the child once the timeout elapses, so the same `cancelled()` signal the
    /// attempt loop races against fires both on the caller's own cancellation and on the
    /// internal timeout. On any exit path the transaction is committed or rolled back exactly
    /// once. A panic inside `f` rolls the transaction back and is re-raised after cleanup.
    pub async fn with_options<F, T>(
        &self,
        ctx: &CancellationToken,
        options: TransactionOptions,
        f: F,
    ) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        let deadline = ctx.child_token();
        let timer = {
            let deadline = deadline.clone();
            let timeout = options.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };

        let result = self.run_attempts(ctx, &deadline, options, f).await;
        timer.abort();
        result
    }

    async fn run_attempts<F, T>(
        &self,
        ctx: &CancellationToken,
        deadline: &CancellationToken,
        options: TransactionOptions,
        f: F,
    ) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        let max_attempts = options.max_retries + 1;
        let backoff = FixedBackoff::new(options.retry_delay);

        for attempt in 1..=max_attempts {
            if deadline.is_cancelled() {
                return Err(self.cancellation_error(ctx, attempt));
            }

            let mut tx = self.pool.begin().await?;
            if let Err(e) = sqlx::query(&options.set_transaction_sql())
                .execute(&mut *tx)
                .await
            {
                let _ = tx.rollback().await;
                return Err(DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e));
            }
            self.emit(TransactionEvent::Begin {
                name: self.name.clone(),
                timestamp: Instant::now(),
                attempt,
            });

            let guarded = AssertUnwindSafe(f(&mut tx)).catch_unwind();

            let ran = tokio::select! {
                biased;
                _ = deadline.cancelled() => None,
                outcome = guarded => Some(outcome),
            };

            let Some(outcome) = ran else {
                let _ = tx.rollback().await;
                return Err(self.cancellation_error(ctx, attempt));
            };

            let body_result = match outcome {
                Ok(result) => result,
                Err(panic) => {
                    let _ = tx.rollback().await;
                    self.emit(TransactionEvent::PanicCaught {
                        name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                    });
                    std::panic::resume_unwind(panic);
                }
            };

            match body_result {
                Err(err) => {
                    let _ = tx.rollback().await;
                    self.emit(TransactionEvent::Rollback {
                        name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        reason: err.to_string(),
                    });

                    let tag = dbr_classify::classify(&err);
                    if tag.retryable_under(&RETRY_ON) && attempt < max_attempts {
                        self.sleep_before_retry(&backoff, attempt).await;
                        continue;
                    }
                    return Err(DbError::new(
                        err.kind(),
                        format!("{err} (after {attempt} attempt(s))"),
                    )
                    .with_source(err));
                }
                Ok(value) => match tx.commit().await {
                    Ok(()) => {
                        self.emit(TransactionEvent::Commit {
                            name: self.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                        });
                        return Ok(value);
                    }
                    Err(sqlx_err) => {
                        let tag = dbr_classify::classify(&sqlx_err);
                        let retryable = tag.retryable_under(&RETRY_ON);
                        let db_err = DbError::new(DbErrorKind::CommitFailed, sqlx_err.to_string())
                            .with_source(sqlx_err);

                        if retryable && attempt < max_attempts {
                            self.sleep_before_retry(&backoff, attempt).await;
                            continue;
                        }
                        return Err(db_err);
                    }
                },
            }
        }

        unreachable!("loop always returns on the final attempt")
    }

    /// Distinguishes the caller's own `ctx` firing (`AcquireCanceled`) from only the
    /// per-attempt timer having elapsed (`Timeout`); both arrive through the same
    /// `deadline.cancelled()` signal since `deadline` is a child of `ctx`.
    fn cancellation_error(&self, ctx: &CancellationToken, attempt: u32) -> DbError {
        self.emit_timed_out(attempt);
        if ctx.is_cancelled() {
            DbError::new(
                DbErrorKind::AcquireCanceled,
                format!("transaction '{}' canceled on attempt {attempt}", self.name),
            )
        } else {
            DbError::timeout(format!(
                "transaction '{}' timed out on attempt {attempt}",
                self.name
            ))
        }
    }

    /// Establishes `SAVEPOINT name` inside an already-open transaction; on success, releases
    /// it, on failure or panic, rolls back to it. A nested failure never invalidates the
    /// enclosing transaction (spec §4.G `Nested`).
    pub async fn nested<'c, F, T>(
        &self,
        ctx: &CancellationToken,
        tx: &'c mut sqlx::Transaction<'_, sqlx::Postgres>,
        name: &str,
        f: F,
    ) -> Result<T, DbError>
    where
        F: FnOnce(&'c mut sqlx::Transaction<'_, sqlx::Postgres>) -> TxFuture<'c, T>,
    {
        let savepoint = sanitize_savepoint_name(name);

        sqlx::query(&format!("SAVEPOINT {savepoint}"))
            .execute(&mut **tx)
            .await
            .map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))?;

        let guarded = AssertUnwindSafe(f(tx)).catch_unwind();

        let ran = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            outcome = guarded => Some(outcome),
        };

        let Some(outcome) = ran else {
            let _ = sqlx::query(&format!("ROLLBACK TO SAVEPOINT {savepoint}"))
                .execute(&mut **tx)
                .await;
            self.emit(TransactionEvent::SavepointRolledBack {
                name: self.name.clone(),
                savepoint: savepoint.clone(),
                timestamp: Instant::now(),
            });
            return Err(DbError::new(
                DbErrorKind::AcquireCanceled,
                format!("savepoint '{savepoint}' canceled"),
            ));
        };

        match outcome {
            Ok(Ok(value)) => {
                sqlx::query(&format!("RELEASE SAVEPOINT {savepoint}"))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
                    })?;
                self.emit(TransactionEvent::SavepointReleased {
                    name: self.name.clone(),
                    savepoint: savepoint.clone(),
                    timestamp: Instant::now(),
                });
                Ok(value)
            }
            Ok(Err(err)) => {
                let _ = sqlx::query(&format!("ROLLBACK TO SAVEPOINT {savepoint}"))
                    .execute(&mut **tx)
                    .await;
                self.emit(TransactionEvent::SavepointRolledBack {
                    name: self.name.clone(),
                    savepoint,
                    timestamp: Instant::now(),
                });
                Err(err)
            }
            Err(panic) => {
                let _ = sqlx::query(&format!("ROLLBACK TO SAVEPOINT {savepoint}"))
                    .execute(&mut **tx)
                    .await;
                std::panic::resume_unwind(panic);
            }
        }
    }

    async fn sleep_before_retry(&self, backoff: &FixedBackoff, attempt: u32) {
        let delay = backoff.delay_for(attempt - 1);
        self.emit(TransactionEvent::Retry {
            name: self.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
        });
        tokio::time::sleep(delay).await;
    }

    fn emit_timed_out(&self, attempt: u32) {
        self.emit(TransactionEvent::TimedOut {
            name: self.name.clone(),
            timestamp: Instant::now(),
            attempt,
        });
    }

    fn emit(&self, event: TransactionEvent) {
        self.event_listeners.emit(&event);
    }
}

/// Savepoint names are interpolated directly into SQL (`sqlx` has no bind-parameter support
/// for identifiers); strip quotes so a caller-supplied name can't break out of the
/// double-quoted identifier.
fn sanitize_savepoint_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}
