use std::time::Duration;

/// Configuration for the connection pool facade (spec §4.E "Configuration" table).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_lifetime_jitter: Duration,
    pub conn_max_idle_time: Duration,
    pub connect_timeout: Duration,
    pub health_check_period: Duration,
    pub test_before_acquire: bool,
    /// Shared by the pool facade (per-call slow-call warning) and `dbr-slowlog` (ring buffer
    /// admission threshold) — see the Open Question decision in the design notes.
    pub slow_query_threshold: Duration,
    pub log_slow_queries: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            conn_max_lifetime: Duration::from_secs(8 * 60),
            conn_max_lifetime_jitter: Duration::from_secs(30),
            conn_max_idle_time: Duration::from_secs(5 * 60),
            connect_timeout: Duration::from_secs(10),
            health_check_period: Duration::from_secs(30),
            test_before_acquire: true,
            slow_query_threshold: Duration::from_millis(100),
            log_slow_queries: true,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for [`PoolConfig`].
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }
}

impl PoolConfigBuilder {
    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.config.min_connections = n;
        self
    }

    pub fn conn_max_lifetime(mut self, d: Duration) -> Self {
        self.config.conn_max_lifetime = d;
        self
    }

    pub fn conn_max_idle_time(mut self, d: Duration) -> Self {
        self.config.conn_max_idle_time = d;
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.config.connect_timeout = d;
        self
    }

    pub fn health_check_period(mut self, d: Duration) -> Self {
        self.config.health_check_period = d;
        self
    }

    pub fn slow_query_threshold(mut self, d: Duration) -> Self {
        self.config.slow_query_threshold = d;
        self
    }

    pub fn log_slow_queries(mut self, enabled: bool) -> Self {
        self.config.log_slow_queries = enabled;
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}
