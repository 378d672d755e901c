use crate::entry::CacheEntry;
use crate::query_cache::{glob_match, QueryCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Default sweep interval (spec §4.I: "runs every 5 minutes").
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// In-memory `QueryCache` with a background sweeper that removes expired entries on a
/// fixed interval, independent of reads (spec §4.I).
///
/// Grounded on `tower-resilience-cache::store::CacheStore`'s lazy expiry-on-read shape;
/// generalized from a single cache-wide TTL to a per-entry TTL (spec §4.I `Set(..., ttl)`
/// takes the TTL per call) and given an eviction sweeper since there is no bounded capacity
/// here to evict against.
pub struct InMemoryCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    sweep_interval: Duration,
}

impl<V> InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            sweep_interval,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Runs the background sweeper until `token` is cancelled, removing every expired entry
    /// once per `sweep_interval`.
    pub async fn run_sweeper(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep().await,
                _ = token.cancelled() => return,
            }
        }
    }

    async fn sweep(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let swept = before - entries.len();

        #[cfg(feature = "metrics")]
        if swept > 0 {
            counter!("db_cache_swept_total").increment(swept as u64);
        }
    }
}

impl<V> Default for InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> QueryCache<V> for InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Takes a single write lock for the whole read+expire-check+maybe-delete path rather
    /// than a read lock followed by a separate write lock, so a concurrent `set` can't
    /// resurrect a key between the expiry check and the delete.
    async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                #[cfg(feature = "metrics")]
                counter!(dbr_core::metrics_names::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Some(entry) => {
                #[cfg(feature = "metrics")]
                counter!(dbr_core::metrics_names::CACHE_HITS_TOTAL).increment(1);
                Some(entry.payload.clone())
            }
            None => {
                #[cfg(feature = "metrics")]
                counter!(dbr_core::metrics_names::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(value, ttl));

        #[cfg(feature = "metrics")]
        counter!(dbr_core::metrics_names::CACHE_SETS_TOTAL).increment(1);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn invalidate_pattern(&self, pattern: &str) {
        self.entries
            .write()
            .await
            .retain(|key, _| !glob_match(pattern, key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache: InMemoryCache<String> = InMemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_removed_lazily_on_read() {
        let cache: InMemoryCache<String> = InMemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(0)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn delete_removes_an_entry() {
        let cache: InMemoryCache<String> = InMemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60)).await;
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn invalidate_pattern_removes_matching_keys_only() {
        let cache: InMemoryCache<String> = InMemoryCache::new();
        cache.set("users:1", "a".to_string(), Duration::from_secs(60)).await;
        cache.set("users:2", "b".to_string(), Duration::from_secs(60)).await;
        cache.set("teams:1", "c".to_string(), Duration::from_secs(60)).await;

        cache.invalidate_pattern("users:*").await;

        assert_eq!(cache.get("users:1").await, None);
        assert_eq!(cache.get("users:2").await, None);
        assert_eq!(cache.get("teams:1").await, Some("c".to_string()));
    }

    #[tokio::test]
    async fn sweeper_removes_expired_entries_without_a_read() {
        let cache = Arc::new(InMemoryCache::<String>::with_sweep_interval(Duration::from_millis(10)));
        cache.set("k", "v".to_string(), Duration::from_millis(1)).await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&cache).run_sweeper(token.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        let _ = handle.await;

        assert_eq!(cache.len().await, 0);
    }
}
