//! Query cache (spec §4.I): a key/TTL store fronting reads, invalidated by matching writes.
//!
//! Generalizes `tower-resilience-cache::store::CacheStore`'s lazy expiry-on-read shape from a
//! single cache-wide TTL to a per-entry one, and adds a background sweeper in place of the
//! teacher's bounded-capacity eviction policies (this cache has no capacity bound to evict
//! against — only TTL expiry and explicit invalidation remove entries).

mod entry;
mod in_memory;
mod query_cache;
mod remote;

pub use entry::CacheEntry;
pub use in_memory::InMemoryCache;
pub use query_cache::QueryCache;
pub use remote::RemoteCache;

#[cfg(feature = "redis")]
pub use remote::RedisCache;
