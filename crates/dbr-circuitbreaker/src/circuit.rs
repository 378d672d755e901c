use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The three states of the circuit breaker (spec §3 `circuit-breaker state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    next_attempt_at: Instant,
    half_open_probe_in_flight: bool,
}

/// Per-target circuit breaker: Closed → Open on consecutive failures past a threshold, Open →
/// HalfOpen after a wait, HalfOpen → Closed on a successful probe or back to Open on failure
/// (spec §4.C).
///
/// `state()` reads a lock-free atomic mirror of the state so callers on a hot path (the pool
/// facade's per-call gate) never contend with `try_acquire`/`on_success`/`on_failure`.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state_atomic: AtomicU8,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                next_attempt_at: Instant::now(),
                half_open_probe_in_flight: false,
            }),
        }
    }

    /// Lock-free read of the current state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether a call may proceed. `Open` admits nothing until `open_timeout` has elapsed, at
    /// which point exactly one caller is admitted as the half-open probe.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();

        let permitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if now >= inner.next_attempt_at {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    false
                } else {
                    inner.half_open_probe_in_flight = true;
                    true
                }
            }
        };

        let state = inner.state;
        drop(inner);

        self.emit(if permitted {
            CircuitBreakerEvent::CallPermitted {
                name: self.config.name.clone(),
                timestamp: now,
                state,
            }
        } else {
            CircuitBreakerEvent::CallRejected {
                name: self.config.name.clone(),
                timestamp: now,
                state,
            }
        });

        permitted
    }

    /// Records a successful call. Per spec §4.C, a success while `Closed` does not reset the
    /// failure counter; only a successful half-open probe resets it (by transitioning to
    /// `Closed`).
    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.half_open_probe_in_flight = false;

        if inner.state == CircuitState::HalfOpen {
            self.transition(&mut inner, CircuitState::Closed);
            inner.consecutive_failures = 0;
        }

        let state = inner.state;
        drop(inner);

        self.emit(CircuitBreakerEvent::SuccessRecorded {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            state,
        });
    }

    /// Records a failed call. `Closed` increments the counter and trips to `Open` once the
    /// threshold is reached; `HalfOpen` always trips back to `Open` and restarts the wait.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.half_open_probe_in_flight = false;

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }

        let consecutive_failures = inner.consecutive_failures;
        drop(inner);

        self.emit(CircuitBreakerEvent::FailureRecorded {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            consecutive_failures,
        });
    }

    pub fn force_open(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.transition(&mut inner, CircuitState::Open);
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.consecutive_failures = 0;
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;

        if to == CircuitState::Open {
            inner.next_attempt_at = Instant::now() + self.config.open_timeout;
        }
        if to == CircuitState::HalfOpen || to == CircuitState::Closed {
            inner.half_open_probe_in_flight = false;
        }

        inner.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(circuit_breaker = %self.config.name, from = ?from, to = ?to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "db_circuit_breaker_transitions_total",
            "circuit_breaker" => self.config.name.clone(),
        )
        .increment(1);

        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                from_state: from,
                to_state: to,
            });
    }

    fn emit(&self, event: CircuitBreakerEvent) {
        self.config.event_listeners.emit(&event);
    }

    /// Time remaining until an `Open` circuit admits a half-open probe, if currently `Open`.
    pub fn time_until_retry(&self) -> Option<Duration> {
        let inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        if inner.state != CircuitState::Open {
            return None;
        }
        Some(
            inner
                .next_attempt_at
                .saturating_duration_since(Instant::now()),
        )
    }
}
