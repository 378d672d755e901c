use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cache entry (spec §3 `cache entry`): served only while `now - created_at <= ttl`;
/// otherwise deleted lazily on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(payload: V, ttl: Duration) -> Self {
        Self {
            payload,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let ttl = chrono::Duration::seconds(self.ttl_secs as i64);
        Utc::now() - self.created_at > ttl
    }
}
