//! Property tests for invariants spec §8 states across the retry engine, independent of any
//! one example scenario: attempt counts never exceed the configured ceiling, and a retry
//! policy with retrying disabled never calls the operation more than once.

use dbr_classify::{Classifiable, RetryOnPolicy};
use dbr_retry::{BackoffKind, RetryEngine, RetryPolicy};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct AlwaysDeadlock;

impl Classifiable for AlwaysDeadlock {
    fn sqlstate(&self) -> Option<String> {
        None
    }
    fn is_cancellation(&self) -> bool {
        false
    }
    fn message(&self) -> String {
        "deadlock detected".to_string()
    }
}

fn run_always_failing(max_attempts: u32) -> (bool, usize, u32) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    rt.block_on(async {
        let engine = RetryEngine::new(
            RetryPolicy::builder()
                .max_attempts(max_attempts)
                .strategy(BackoffKind::Fixed)
                .initial_delay(Duration::from_micros(1))
                .build(),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = engine
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AlwaysDeadlock)
                }
            })
            .await;

        (
            outcome.success,
            outcome.attempts.len(),
            calls.load(Ordering::SeqCst),
        )
    })
}

proptest! {
    /// An operation that always fails with a retryable error is attempted exactly
    /// `max_attempts` times, never more, never fewer.
    #[test]
    fn attempts_never_exceed_max_attempts(max_attempts in 1u32..12) {
        let (success, recorded_attempts, actual_calls) = run_always_failing(max_attempts);
        prop_assert!(!success);
        prop_assert_eq!(recorded_attempts as u32, max_attempts);
        prop_assert_eq!(actual_calls, max_attempts);
    }

    /// A `RetryOnPolicy::none()` policy never retries a deadlock, no matter how high
    /// `max_attempts` is set: the tag is recognized but the policy opts out of it.
    #[test]
    fn retry_on_none_never_retries_deadlocks(max_attempts in 1u32..12) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let calls = rt.block_on(async {
            let engine = RetryEngine::new(
                RetryPolicy::builder()
                    .max_attempts(max_attempts)
                    .retry_on(RetryOnPolicy::none())
                    .build(),
            );
            let calls = Arc::new(AtomicU32::new(0));
            let calls_clone = Arc::clone(&calls);

            engine
                .execute(move || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(AlwaysDeadlock)
                    }
                })
                .await;

            calls.load(Ordering::SeqCst)
        });

        prop_assert_eq!(calls, 1);
    }
}
