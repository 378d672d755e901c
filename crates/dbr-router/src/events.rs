use dbr_core::events::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the replica health loop and write-retry path (spec §4.J).
#[derive(Debug, Clone)]
pub enum RouterEvent {
    ReplicaHealthy {
        replica_index: usize,
        timestamp: Instant,
    },
    ReplicaUnhealthy {
        replica_index: usize,
        timestamp: Instant,
    },
    ReadRoutedToPrimary {
        timestamp: Instant,
        reason: &'static str,
    },
    ReadRoutedToReplica {
        replica_index: usize,
        timestamp: Instant,
    },
    WriteRetried {
        attempt: u32,
        timestamp: Instant,
    },
}

impl ResilienceEvent for RouterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RouterEvent::ReplicaHealthy { .. } => "replica_healthy",
            RouterEvent::ReplicaUnhealthy { .. } => "replica_unhealthy",
            RouterEvent::ReadRoutedToPrimary { .. } => "read_routed_to_primary",
            RouterEvent::ReadRoutedToReplica { .. } => "read_routed_to_replica",
            RouterEvent::WriteRetried { .. } => "write_retried",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RouterEvent::ReplicaHealthy { timestamp, .. }
            | RouterEvent::ReplicaUnhealthy { timestamp, .. }
            | RouterEvent::ReadRoutedToPrimary { timestamp, .. }
            | RouterEvent::ReadRoutedToReplica { timestamp, .. }
            | RouterEvent::WriteRetried { timestamp, .. } => *timestamp,
        }
    }
}
