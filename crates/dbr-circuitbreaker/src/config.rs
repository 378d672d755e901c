use crate::events::CircuitBreakerEvent;
use dbr_core::events::EventListeners;
use std::time::Duration;

/// Configuration for a [`crate::CircuitBreaker`] (spec §4.C / §3 `circuit_breaker`).
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) open_timeout: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    open_timeout: Duration,
    name: String,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults: `failure_threshold = 5`, `open_timeout = 30s`, `name = "<unnamed>"`.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the number of consecutive failures that trips the circuit from `Closed` to `Open`.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays `Open` before a probe is permitted through.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(dbr_core::events::FnListener::new(listener));
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_timeout: self.open_timeout,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}
