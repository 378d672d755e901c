//! Retry events, observable via `EventListeners<RetryEvent>`.

use dbr_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to happen after `attempt` failed; sleeping `delay` first.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// The operation succeeded, after `attempts` total tries (1 means no retries needed).
    Success {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The operation failed after exhausting all attempts.
    Error {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// An error occurred but was classified as non-retryable; failed immediately.
    IgnoredError { name: String, timestamp: Instant },
    /// The attached circuit breaker rejected the call before any attempt was made.
    CircuitOpen { name: String, timestamp: Instant },
    /// The cancellation token fired mid-sleep between retries.
    Cancelled {
        name: String,
        timestamp: Instant,
        attempt: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Error { .. } => "error",
            RetryEvent::IgnoredError { .. } => "ignored_error",
            RetryEvent::CircuitOpen { .. } => "circuit_open",
            RetryEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. }
            | RetryEvent::CircuitOpen { timestamp, .. }
            | RetryEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }
}
