//! Retry engine (spec §4.D): executes an operation under a [`RetryPolicy`], classifying
//! failures via `dbr-classify` and consulting an attached `dbr-circuitbreaker` before every
//! attempt.

mod engine;
mod events;
mod policy;

pub use engine::{AttemptRecord, RetryEngine, RetryFailure, RetryOutcome};
pub use events::RetryEvent;
pub use policy::{BackoffKind, RetryPolicy, RetryPolicyBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use dbr_classify::RetryOnPolicy;
    use dbr_core::{DbError, DbErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct TestError(&'static str);

    impl dbr_classify::Classifiable for TestError {
        fn sqlstate(&self) -> Option<String> {
            None
        }
        fn is_cancellation(&self) -> bool {
            false
        }
        fn message(&self) -> String {
            self.0.to_string()
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_retrying() {
        let engine = RetryEngine::new(RetryPolicy::builder().max_attempts(3).build());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(42)
                }
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.value, Some(42));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let engine = RetryEngine::new(
            RetryPolicy::builder()
                .max_attempts(5)
                .strategy(BackoffKind::Fixed)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(TestError("connection reset by peer"))
                    } else {
                        Ok(99)
                    }
                }
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let engine = RetryEngine::new(RetryPolicy::builder().max_attempts(5).build());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TestError("syntax error"))
                }
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome.failure, Some(RetryFailure::Operation(_))));
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_final_error() {
        let engine = RetryEngine::new(
            RetryPolicy::builder()
                .max_attempts(3)
                .strategy(BackoffKind::Fixed)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome: RetryOutcome<(), TestError> = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError("deadlock detected"))
                }
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn open_circuit_breaker_rejects_without_calling_operation() {
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .circuit_breaker(
                dbr_circuitbreaker::CircuitBreakerConfig::builder()
                    .failure_threshold(1)
                    .open_timeout(Duration::from_secs(60))
                    .build(),
            )
            .build();
        let engine = RetryEngine::new(policy);

        let outcome: RetryOutcome<(), TestError> = engine
            .execute(|| async { Err(TestError("connection reset")) })
            .await;
        assert!(!outcome.success);

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let outcome: RetryOutcome<(), TestError> = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.failure, Some(RetryFailure::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn db_error_retry_on_policy_none_never_retries() {
        let engine = RetryEngine::new(
            RetryPolicy::builder()
                .retry_on(RetryOnPolicy::none())
                .build(),
        );
        assert_eq!(engine.circuit_breaker().is_none(), true);
        let _ = DbErrorKind::Timeout;
        let _ = DbError::timeout("slow");
    }
}
