use std::time::Duration;

/// Configuration for a [`crate::ReplicaRouter`] (spec §4.J).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// How often the health loop pings every replica. Default 30s.
    pub health_check_interval: Duration,
    /// Per-replica ping budget during a health tick. Default 5s.
    pub health_check_timeout: Duration,
    /// Extra attempts for writes beyond the first, on a retryable error class.
    pub max_retries: u32,
    /// Fixed delay between write retry attempts.
    pub retry_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Builder for [`RouterConfig`].
#[derive(Debug, Clone, Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.config.health_check_interval = interval;
        self
    }

    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_check_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn build(self) -> RouterConfig {
        self.config
    }
}
