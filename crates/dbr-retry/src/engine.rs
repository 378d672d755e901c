use crate::events::RetryEvent;
use crate::policy::RetryPolicy;
use dbr_circuitbreaker::CircuitBreaker;
use dbr_classify::{Classifiable, RetryTag};
use dbr_core::events::EventListeners;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};
#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

/// One attempt's outcome, successful or not (spec §3 `retry attempt record`).
#[derive(Debug, Clone)]
pub struct AttemptRecord<E> {
    pub attempt_number: u32,
    pub started_at: Instant,
    pub duration: Duration,
    pub error: Option<E>,
}

/// Why a retried operation ultimately did not succeed.
#[derive(Debug, Clone)]
pub enum RetryFailure<E> {
    /// The operation itself failed on the final attempt.
    Operation(E),
    /// A circuit breaker attached to this engine rejected the call before any attempt ran.
    CircuitOpen,
    /// The cancellation token fired, either before the first attempt or mid-sleep.
    Cancelled,
}

/// Aggregate result of [`RetryEngine::execute`] (spec §3 `retry result`).
#[derive(Debug, Clone)]
pub struct RetryOutcome<T, E> {
    pub success: bool,
    pub value: Option<T>,
    pub failure: Option<RetryFailure<E>>,
    pub attempts: Vec<AttemptRecord<E>>,
    pub total_duration: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    fn failed(failure: RetryFailure<E>, attempts: Vec<AttemptRecord<E>>, start: Instant) -> Self {
        Self {
            success: false,
            value: None,
            failure: Some(failure),
            attempts,
            total_duration: start.elapsed(),
        }
    }

    fn succeeded(value: T, attempts: Vec<AttemptRecord<E>>, start: Instant) -> Self {
        Self {
            success: true,
            value: Some(value),
            failure: None,
            attempts,
            total_duration: start.elapsed(),
        }
    }

    /// Converts into `Ok(value)` on success or `Err(failure)` on failure, discarding attempt
    /// history. Convenient when a caller only cares about the final result.
    pub fn into_result(self) -> Result<T, RetryFailure<E>> {
        match self.value {
            Some(value) => Ok(value),
            None => Err(self.failure.expect("failed outcome always carries a failure")),
        }
    }
}

/// Executes an async operation under a [`RetryPolicy`], consulting an optional
/// [`CircuitBreaker`] before every attempt (spec §4.D).
pub struct RetryEngine {
    policy: RetryPolicy,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryEngine {
    pub fn new(mut policy: RetryPolicy) -> Self {
        let circuit_breaker = policy
            .circuit_breaker
            .take()
            .map(|config| Arc::new(CircuitBreaker::new(config)));

        Self {
            policy,
            circuit_breaker,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn on_event<F>(&mut self, listener: F)
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(dbr_core::events::FnListener::new(listener));
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// Runs `op` under the policy with no cancellation token.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> RetryOutcome<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classifiable + Clone,
    {
        self.execute_cancellable(op, &CancellationToken::new()).await
    }

    /// Runs `op` under the policy, interrupting the inter-attempt sleep if `token` fires.
    pub async fn execute_cancellable<F, Fut, T, E>(
        &self,
        op: F,
        token: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classifiable + Clone,
    {
        let start = Instant::now();
        let mut attempts = Vec::new();

        if let Some(breaker) = &self.circuit_breaker {
            if !breaker.try_acquire() {
                #[cfg(feature = "tracing")]
                warn!(retry = %self.policy.name, "circuit breaker open, skipping attempt");
                self.emit(RetryEvent::CircuitOpen {
                    name: self.policy.name.clone(),
                    timestamp: Instant::now(),
                });
                return RetryOutcome::failed(RetryFailure::CircuitOpen, attempts, start);
            }
        }

        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            let attempt_started = Instant::now();
            let result = op().await;
            let duration = attempt_started.elapsed();

            match result {
                Ok(value) => {
                    attempts.push(AttemptRecord {
                        attempt_number: attempt,
                        started_at: attempt_started,
                        duration,
                        error: None,
                    });

                    if let Some(breaker) = &self.circuit_breaker {
                        breaker.on_success();
                    }

                    #[cfg(feature = "metrics")]
                    {
                        counter!("db_retry_calls_total", "retry" => self.policy.name.clone(), "result" => "success").increment(1);
                        histogram!("db_retry_attempts", "retry" => self.policy.name.clone())
                            .record(attempt as f64);
                    }
                    #[cfg(feature = "tracing")]
                    {
                        if attempt > 1 {
                            info!(retry = %self.policy.name, attempts = attempt, "operation succeeded after retries");
                        } else {
                            debug!(retry = %self.policy.name, "operation succeeded on first attempt");
                        }
                    }

                    self.emit(RetryEvent::Success {
                        name: self.policy.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    return RetryOutcome::succeeded(value, attempts, start);
                }
                Err(error) => {
                    let tag = dbr_classify::classify(&error);
                    attempts.push(AttemptRecord {
                        attempt_number: attempt,
                        started_at: attempt_started,
                        duration,
                        error: Some(error.clone()),
                    });

                    let retryable = tag.retryable_under(&self.policy.retry_on);
                    let is_last = attempt >= max_attempts;

                    if !retryable {
                        if let Some(breaker) = &self.circuit_breaker {
                            breaker.on_failure();
                        }

                        if tag == RetryTag::Cancellation {
                            self.emit(RetryEvent::Cancelled {
                                name: self.policy.name.clone(),
                                timestamp: Instant::now(),
                                attempt,
                            });
                            return RetryOutcome::failed(RetryFailure::Cancelled, attempts, start);
                        }

                        #[cfg(feature = "tracing")]
                        debug!(retry = %self.policy.name, "error not retryable, failing immediately");
                        self.emit(RetryEvent::IgnoredError {
                            name: self.policy.name.clone(),
                            timestamp: Instant::now(),
                        });
                        return RetryOutcome::failed(
                            RetryFailure::Operation(error),
                            attempts,
                            start,
                        );
                    }

                    if is_last {
                        if let Some(breaker) = &self.circuit_breaker {
                            breaker.on_failure();
                        }

                        #[cfg(feature = "metrics")]
                        counter!("db_retry_calls_total", "retry" => self.policy.name.clone(), "result" => "exhausted").increment(1);
                        #[cfg(feature = "tracing")]
                        warn!(retry = %self.policy.name, attempts = attempt, "retry attempts exhausted");

                        self.emit(RetryEvent::Error {
                            name: self.policy.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        return RetryOutcome::failed(
                            RetryFailure::Operation(error),
                            attempts,
                            start,
                        );
                    }

                    let delay = self.policy.backoff.delay_for(attempt - 1);

                    #[cfg(feature = "metrics")]
                    counter!("db_retry_attempts_total", "retry" => self.policy.name.clone())
                        .increment(1);
                    #[cfg(feature = "tracing")]
                    debug!(retry = %self.policy.name, attempt, delay_ms = delay.as_millis(), "retrying after delay");

                    self.emit(RetryEvent::Retry {
                        name: self.policy.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => {
                            if let Some(breaker) = &self.circuit_breaker {
                                breaker.on_failure();
                            }
                            self.emit(RetryEvent::Cancelled {
                                name: self.policy.name.clone(),
                                timestamp: Instant::now(),
                                attempt,
                            });
                            return RetryOutcome::failed(RetryFailure::Cancelled, attempts, start);
                        }
                    }
                }
            }
        }

        unreachable!("loop always returns on the final attempt")
    }

    fn emit(&self, event: RetryEvent) {
        self.event_listeners.emit(&event);
    }
}
