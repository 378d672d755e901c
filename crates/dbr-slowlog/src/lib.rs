//! Slow-query recorder (spec §4.K): a bounded ring buffer of the slowest-seen queries, the
//! same `VecDeque`-as-ring shape `tower-resilience-circuitbreaker::circuit::Circuit` uses for
//! its time-based call window, applied here to a capacity-bounded ring instead of a
//! time-bounded one.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

/// One recorded slow query (spec §3 `slow-query record`).
#[derive(Debug, Clone)]
pub struct SlowQueryRecord {
    /// The query text, sanitized by the caller before recording (never raw argument values).
    pub query: String,
    pub duration: Duration,
    pub recorded_at: DateTime<Utc>,
    pub query_type: String,
    pub arg_count: usize,
}

/// A capacity-bounded ring of the most recent slow queries; the oldest is evicted on insert
/// once the ring is full.
pub struct SlowQueryLog {
    capacity: usize,
    records: RwLock<VecDeque<SlowQueryRecord>>,
}

impl SlowQueryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, record: SlowQueryRecord) {
        let mut records = self.records.write().expect("slow query log lock poisoned");
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);

        #[cfg(feature = "metrics")]
        metrics::counter!(dbr_core::metrics_names::SLOW_QUERIES_TOTAL).increment(1);
    }

    /// Returns a snapshot of all currently recorded slow queries, oldest first.
    pub fn snapshot(&self) -> Vec<SlowQueryRecord> {
        self.records
            .read()
            .expect("slow query log lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("slow query log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SlowQueryLog {
    /// Default capacity of 100, per spec §3.
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(query: &str, ms: u64) -> SlowQueryRecord {
        SlowQueryRecord {
            query: query.to_string(),
            duration: Duration::from_millis(ms),
            recorded_at: Utc::now(),
            query_type: "SELECT".to_string(),
            arg_count: 0,
        }
    }

    #[test]
    fn records_are_kept_in_insertion_order() {
        let log = SlowQueryLog::new(10);
        log.record(record("select 1", 150));
        log.record(record("select 2", 200));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].query, "select 1");
        assert_eq!(snapshot[1].query, "select 2");
    }

    #[test]
    fn oldest_record_evicted_once_full() {
        let log = SlowQueryLog::new(2);
        log.record(record("select 1", 150));
        log.record(record("select 2", 200));
        log.record(record("select 3", 250));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].query, "select 2");
        assert_eq!(snapshot[1].query, "select 3");
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let log = SlowQueryLog::default();
        assert_eq!(log.capacity(), 100);
        assert!(log.is_empty());
    }

    #[test]
    fn capacity_of_zero_is_clamped_to_one() {
        let log = SlowQueryLog::new(0);
        assert_eq!(log.capacity(), 1);
        log.record(record("select 1", 150));
        log.record(record("select 2", 200));
        assert_eq!(log.len(), 1);
    }
}
