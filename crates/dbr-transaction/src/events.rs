use dbr_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted over a transaction's lifecycle (spec §4.G).
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    Begin {
        name: String,
        timestamp: Instant,
        attempt: u32,
    },
    Commit {
        name: String,
        timestamp: Instant,
        attempt: u32,
    },
    Rollback {
        name: String,
        timestamp: Instant,
        attempt: u32,
        reason: String,
    },
    Retry {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    TimedOut {
        name: String,
        timestamp: Instant,
        attempt: u32,
    },
    PanicCaught {
        name: String,
        timestamp: Instant,
        attempt: u32,
    },
    SavepointReleased {
        name: String,
        savepoint: String,
        timestamp: Instant,
    },
    SavepointRolledBack {
        name: String,
        savepoint: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::Begin { .. } => "begin",
            TransactionEvent::Commit { .. } => "commit",
            TransactionEvent::Rollback { .. } => "rollback",
            TransactionEvent::Retry { .. } => "retry",
            TransactionEvent::TimedOut { .. } => "timed_out",
            TransactionEvent::PanicCaught { .. } => "panic_caught",
            TransactionEvent::SavepointReleased { .. } => "savepoint_released",
            TransactionEvent::SavepointRolledBack { .. } => "savepoint_rolled_back",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TransactionEvent::Begin { timestamp, .. }
            | TransactionEvent::Commit { timestamp, .. }
            | TransactionEvent::Rollback { timestamp, .. }
            | TransactionEvent::Retry { timestamp, .. }
            | TransactionEvent::TimedOut { timestamp, .. }
            | TransactionEvent::PanicCaught { timestamp, .. }
            | TransactionEvent::SavepointReleased { timestamp, .. }
            | TransactionEvent::SavepointRolledBack { timestamp, .. } => *timestamp,
        }
    }
}
