use async_trait::async_trait;
use dbr_core::DbError;
use std::time::Duration;

/// A remote key/value cache backend (spec §4.I: "remote key/value store with a stable key
/// prefix"). Unlike [`crate::InMemoryCache`], a remote backend can fail (network, backend
/// down), so every operation returns a [`DbError`].
#[async_trait]
pub trait RemoteCache<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, DbError>;
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), DbError>;
    async fn delete(&self, key: &str) -> Result<(), DbError>;
    async fn invalidate_pattern(&self, pattern: &str) -> Result<(), DbError>;
}

#[cfg(feature = "redis")]
pub use self::redis_cache::RedisCache;

#[cfg(feature = "redis")]
mod redis_cache {
    use super::RemoteCache;
    use crate::entry::CacheEntry;
    use async_trait::async_trait;
    use dbr_core::{DbError, DbErrorKind};
    use redis::AsyncCommands;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use std::marker::PhantomData;
    use std::time::Duration;

    /// Wraps a `redis`-backed store under a stable key prefix. Entries are serialized with
    /// their creation time and TTL (a [`CacheEntry`]) and the reader double-checks expiry
    /// even though every key is also written with a Redis-side `EX` so the backend's own TTL
    /// machinery evicts it independently.
    pub struct RedisCache<V> {
        manager: redis::aio::ConnectionManager,
        key_prefix: String,
        _marker: PhantomData<V>,
    }

    impl<V> RedisCache<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, DbError> {
            let client = redis::Client::open(url).map_err(|e| {
                DbError::new(DbErrorKind::ConnectFailed, e.to_string()).with_source(e)
            })?;
            let manager = client.get_connection_manager().await.map_err(|e| {
                DbError::new(DbErrorKind::ConnectFailed, e.to_string()).with_source(e)
            })?;

            Ok(Self {
                manager,
                key_prefix: key_prefix.into(),
                _marker: PhantomData,
            })
        }

        fn namespaced(&self, key: &str) -> String {
            format!("{}{}", self.key_prefix, key)
        }
    }

    #[async_trait]
    impl<V> RemoteCache<V> for RedisCache<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        async fn get(&self, key: &str) -> Result<Option<V>, DbError> {
            let mut conn = self.manager.clone();
            let raw: Option<String> = conn.get(self.namespaced(key)).await.map_err(|e| {
                DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
            })?;

            let Some(raw) = raw else { return Ok(None) };
            let entry: CacheEntry<V> = serde_json::from_str(&raw).map_err(|e| {
                DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
            })?;

            if entry.is_expired() {
                let _ = self.delete(key).await;
                return Ok(None);
            }
            Ok(Some(entry.payload))
        }

        async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), DbError> {
            let entry = CacheEntry::new(value, ttl);
            let raw = serde_json::to_string(&entry).map_err(|e| {
                DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
            })?;

            let mut conn = self.manager.clone();
            let _: () = conn
                .set_ex(self.namespaced(key), raw, ttl.as_secs().max(1))
                .await
                .map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), DbError> {
            let mut conn = self.manager.clone();
            let _: () = conn
                .del(self.namespaced(key))
                .await
                .map_err(|e| DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e))?;
            Ok(())
        }

        async fn invalidate_pattern(&self, pattern: &str) -> Result<(), DbError> {
            let scan_pattern = self.namespaced(pattern);
            let mut conn = self.manager.clone();

            let mut cursor = 0u64;
            loop {
                let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&scan_pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| {
                        DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
                    })?;

                if !keys.is_empty() {
                    let _: () = conn.del(&keys).await.map_err(|e| {
                        DbError::new(DbErrorKind::QueryFailed, e.to_string()).with_source(e)
                    })?;
                }

                if next_cursor == 0 {
                    break;
                }
                cursor = next_cursor;
            }

            Ok(())
        }
    }
}
