//! Workspace integration tests for the pieces of spec §8's end-to-end scenarios that don't
//! require a live Postgres connection: deadlock retry across several attempts, a circuit
//! breaker that opens, refuses, then admits a single half-open probe, and cancellation firing
//! mid-backoff.

use dbr_circuitbreaker::CircuitBreakerConfig;
use dbr_classify::Classifiable;
use dbr_retry::{BackoffKind, RetryEngine, RetryFailure, RetryOutcome, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct FakeDbError(&'static str);

impl Classifiable for FakeDbError {
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

/// Scenario 3: a write hits "deadlock detected" on the first three attempts and succeeds on
/// the fourth; the retry engine should report exactly four attempts and a successful outcome.
#[tokio::test]
async fn deadlock_retries_across_four_attempts_then_succeeds() {
    let engine = RetryEngine::new(
        RetryPolicy::builder()
            .max_attempts(4)
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
                if n < 3 {
                    Err(FakeDbError("deadlock detected"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts.len(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Same scenario, but the deadlock never clears: the engine exhausts its attempts and
/// surfaces the final operation error rather than retrying forever.
#[tokio::test]
async fn deadlock_that_never_clears_exhausts_attempts() {
    let engine = RetryEngine::new(
        RetryPolicy::builder()
            .max_attempts(4)
            .strategy(BackoffKind::Fixed)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );

    let outcome: RetryOutcome<(), FakeDbError> = engine
        .execute(|| async { Err(FakeDbError("deadlock detected")) })
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts.len(), 4);
    assert!(matches!(outcome.failure, Some(RetryFailure::Operation(_))));
}

/// Scenario 4: a circuit breaker attached to the retry policy trips open after enough
/// consecutive failures, refuses calls outright while open, then admits exactly one
/// half-open probe once its timeout elapses and closes again on that probe's success.
#[tokio::test]
async fn circuit_opens_refuses_then_admits_one_probe_after_timeout() {
    let policy = RetryPolicy::builder()
        .max_attempts(1)
        .circuit_breaker(
            CircuitBreakerConfig::builder()
                .failure_threshold(2)
                .open_timeout(Duration::from_millis(20))
                .name("probe-test")
                .build(),
        )
        .build();
    let engine = RetryEngine::new(policy);

    // Two consecutive failures trip the breaker open.
    for _ in 0..2 {
        let outcome: RetryOutcome<(), FakeDbError> = engine
            .execute(|| async { Err(FakeDbError("connection reset by peer")) })
            .await;
        assert!(!outcome.success);
    }

    // While open, calls are refused before the operation ever runs.
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let outcome: RetryOutcome<(), FakeDbError> = engine
        .execute(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
    assert!(matches!(outcome.failure, Some(RetryFailure::CircuitOpen)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(30)).await;

    // The timeout has elapsed: exactly one probe is admitted, and it succeeds, closing the
    // circuit again.
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let outcome = engine
        .execute(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FakeDbError>(())
            }
        })
        .await;
    assert!(outcome.success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The circuit is closed again: a subsequent failure alone shouldn't reopen it (threshold
    // is 2), proving the probe's success reset the failure count.
    let outcome: RetryOutcome<(), FakeDbError> = engine
        .execute(|| async { Err(FakeDbError("connection reset by peer")) })
        .await;
    assert!(matches!(outcome.failure, Some(RetryFailure::Operation(_))));

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let outcome = engine
        .execute(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FakeDbError>(())
            }
        })
        .await;
    assert!(outcome.success, "single failure after reset shouldn't have reopened the breaker");
}

/// Scenario 6: cancelling the token mid-backoff interrupts the sleep and the engine reports
/// `RetryFailure::Cancelled` without ever attempting the operation a further time.
#[tokio::test]
async fn cancellation_during_backoff_stops_further_attempts() {
    let engine = RetryEngine::new(
        RetryPolicy::builder()
            .max_attempts(10)
            .strategy(BackoffKind::Fixed)
            .initial_delay(Duration::from_secs(60))
            .build(),
    );
    let token = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));

    let token_clone = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token_clone.cancel();
    });

    let calls_clone = Arc::clone(&calls);
    let outcome: RetryOutcome<(), FakeDbError> = engine
        .execute_cancellable(
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeDbError("connection refused"))
                }
            },
            &token,
        )
        .await;

    assert!(!outcome.success);
    assert!(matches!(outcome.failure, Some(RetryFailure::Cancelled)));
    // Only the first attempt ran; cancellation fired during the subsequent backoff sleep.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A non-retryable error (no recognized SQLSTATE or message pattern) fails on the very first
/// attempt regardless of `max_attempts`, even with a circuit breaker attached.
#[tokio::test]
async fn non_retryable_error_fails_on_first_attempt_only() {
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .circuit_breaker(
            CircuitBreakerConfig::builder()
                .failure_threshold(3)
                .open_timeout(Duration::from_secs(60))
                .build(),
        )
        .build();
    let engine = RetryEngine::new(policy);

    let outcome: RetryOutcome<(), FakeDbError> = engine
        .execute(|| async { Err(FakeDbError("syntax error at or near \"SELECT\"")) })
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts.len(), 1);
    assert!(matches!(outcome.failure, Some(RetryFailure::Operation(_))));
}
