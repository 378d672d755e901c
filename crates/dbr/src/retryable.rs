use crate::Database;
use dbr_core::DbError;
use dbr_retry::{RetryEngine, RetryFailure, RetryPolicy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "pool")]
use dbr_pool::SqlParam;

/// Wraps a [`Database`] with a retry policy, by composition rather than shared mutation (spec
/// §9 "Cyclic/back references": "the `RetryableDatabase` layer wraps the facade by
/// composition").
///
/// `DbError` carries a boxed source error and so isn't `Clone`, which `RetryEngine::execute`
/// requires of its error type. Each call here is wrapped in `Arc<DbError>` — cheap to clone,
/// and `dbr-classify` classifies straight through it — purely to satisfy that bound; the
/// error returned to callers is the same `Arc<DbError>`, not a lossy conversion.
pub struct RetryableDatabase {
    inner: Arc<Database>,
    engine: RetryEngine,
}

impl RetryableDatabase {
    pub fn new(inner: Arc<Database>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            engine: RetryEngine::new(policy),
        }
    }

    pub fn inner(&self) -> &Arc<Database> {
        &self.inner
    }

    #[cfg(feature = "pool")]
    pub async fn query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<serde_json::Value>, Arc<DbError>> {
        let outcome = self
            .engine
            .execute_cancellable(
                || async { self.inner.query(ctx, sql, args).await.map_err(Arc::new) },
                ctx,
            )
            .await;
        Self::resolve(outcome)
    }

    #[cfg(feature = "pool")]
    pub async fn exec(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<u64, Arc<DbError>> {
        let outcome = self
            .engine
            .execute_cancellable(
                || async { self.inner.exec(ctx, sql, args).await.map_err(Arc::new) },
                ctx,
            )
            .await;
        Self::resolve(outcome)
    }

    fn resolve<T>(
        outcome: dbr_retry::RetryOutcome<T, Arc<DbError>>,
    ) -> Result<T, Arc<DbError>> {
        if let Some(value) = outcome.value {
            return Ok(value);
        }
        match outcome.failure {
            Some(RetryFailure::Operation(err)) => Err(err),
            Some(RetryFailure::CircuitOpen) => Err(Arc::new(DbError::circuit_open("database"))),
            Some(RetryFailure::Cancelled) => {
                Err(Arc::new(DbError::timeout("retry cancelled")))
            }
            None => Err(Arc::new(DbError::new(
                dbr_core::DbErrorKind::Unknown,
                "retry engine returned neither a value nor a failure",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbr_core::DbErrorKind;
    use std::time::Duration;

    fn outcome_with_value(v: u64) -> dbr_retry::RetryOutcome<u64, Arc<DbError>> {
        dbr_retry::RetryOutcome {
            success: true,
            value: Some(v),
            failure: None,
            attempts: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }

    fn outcome_with_failure(
        failure: RetryFailure<Arc<DbError>>,
    ) -> dbr_retry::RetryOutcome<u64, Arc<DbError>> {
        dbr_retry::RetryOutcome {
            success: false,
            value: None,
            failure: Some(failure),
            attempts: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }

    #[test]
    fn resolve_returns_value_on_success() {
        assert_eq!(
            RetryableDatabase::resolve(outcome_with_value(7)).unwrap(),
            7
        );
    }

    #[test]
    fn resolve_surfaces_the_operation_error() {
        let err = Arc::new(DbError::new(DbErrorKind::QueryFailed, "syntax error"));
        let result = RetryableDatabase::resolve(outcome_with_failure(RetryFailure::Operation(
            Arc::clone(&err),
        )));
        assert_eq!(result.unwrap_err().kind(), DbErrorKind::QueryFailed);
    }

    #[test]
    fn resolve_maps_circuit_open_to_circuit_open_kind() {
        let result = RetryableDatabase::resolve(outcome_with_failure(RetryFailure::CircuitOpen));
        assert_eq!(result.unwrap_err().kind(), DbErrorKind::CircuitOpen);
    }

    #[test]
    fn resolve_maps_cancellation_to_timeout_kind() {
        let result = RetryableDatabase::resolve(outcome_with_failure(RetryFailure::Cancelled));
        assert_eq!(result.unwrap_err().kind(), DbErrorKind::Timeout);
    }
}
