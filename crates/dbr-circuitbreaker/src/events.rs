//! Circuit breaker events, observable via `EventListeners<CircuitBreakerEvent>`.

use crate::CircuitState;
use dbr_core::events::ResilienceEvent;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    StateTransition {
        name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    CallPermitted {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    CallRejected {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    FailureRecorded {
        name: String,
        timestamp: Instant,
        consecutive_failures: u32,
    },
    SuccessRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. } => *timestamp,
        }
    }
}
