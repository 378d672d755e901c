use std::time::Duration;

#[cfg(feature = "pool")]
use dbr_pool::PoolConfig;

/// Top-level configuration for [`crate::Database`]: connection strings plus each wired
/// component's own config (spec §2 data flow: facade/router on top, pool/cache/migrate/tx
/// underneath).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub primary_url: String,
    pub replica_urls: Vec<String>,
    #[cfg(feature = "pool")]
    pub pool: PoolConfig,
    pub pool_monitor_warn_utilization: f64,
    pub pool_monitor_critical_utilization: f64,
    #[cfg(feature = "cache")]
    pub cache_sweep_interval: Duration,
    /// How long a cached read result is trusted before it must be refetched (spec §4.I `Set`'s
    /// `ttl`); writes still invalidate matching keys immediately regardless of this value.
    #[cfg(feature = "cache")]
    pub cache_default_ttl: Duration,
    #[cfg(feature = "router")]
    pub router: dbr_router::RouterConfig,
}

impl DatabaseConfig {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            replica_urls: Vec::new(),
            #[cfg(feature = "pool")]
            pool: PoolConfig::default(),
            pool_monitor_warn_utilization: 0.8,
            pool_monitor_critical_utilization: 0.95,
            #[cfg(feature = "cache")]
            cache_sweep_interval: Duration::from_secs(5 * 60),
            #[cfg(feature = "cache")]
            cache_default_ttl: Duration::from_secs(30),
            #[cfg(feature = "router")]
            router: dbr_router::RouterConfig::default(),
        }
    }

    pub fn with_replica(mut self, url: impl Into<String>) -> Self {
        self.replica_urls.push(url.into());
        self
    }

    #[cfg(feature = "pool")]
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_replica_appends_in_order() {
        let config = DatabaseConfig::new("postgres://primary")
            .with_replica("postgres://replica-a")
            .with_replica("postgres://replica-b");

        assert_eq!(
            config.replica_urls,
            vec!["postgres://replica-a", "postgres://replica-b"]
        );
    }

    #[test]
    fn no_replicas_by_default() {
        let config = DatabaseConfig::new("postgres://primary");
        assert!(config.replica_urls.is_empty());
    }
}
