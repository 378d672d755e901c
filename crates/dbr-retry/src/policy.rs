use dbr_backoff::{BackoffStrategy, ExponentialBackoff, FixedBackoff, LinearBackoff};
use dbr_circuitbreaker::CircuitBreakerConfig;
use dbr_classify::RetryOnPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Which backoff shape a [`RetryPolicy`] uses (spec §3 `strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

/// A retry policy (spec §3 `retry policy`): attempt budget, backoff shape, and which error
/// classes are eligible for retry.
pub struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Arc<dyn BackoffStrategy>,
    pub(crate) retry_on: RetryOnPolicy,
    pub(crate) name: String,
    pub(crate) circuit_breaker: Option<CircuitBreakerConfig>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    max_attempts: u32,
    strategy: BackoffKind,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    jitter_factor: f64,
    retry_on: RetryOnPolicy,
    name: String,
    circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults: `max_attempts = 3`, exponential backoff from 100ms up to 5s, no jitter,
    /// all transient classes retried, no circuit breaker.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            strategy: BackoffKind::Exponential,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: false,
            jitter_factor: 0.0,
            retry_on: RetryOnPolicy::default(),
            name: String::from("<unnamed>"),
            circuit_breaker: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn strategy(mut self, strategy: BackoffKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter = true;
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    pub fn retry_on(mut self, retry_on: RetryOnPolicy) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn build(self) -> RetryPolicy {
        let max_delay = self.max_delay.max(self.initial_delay);
        let jitter_factor = if self.jitter { self.jitter_factor } else { 0.0 };

        let backoff: Arc<dyn BackoffStrategy> = match self.strategy {
            BackoffKind::Fixed => Arc::new(FixedBackoff::new(self.initial_delay)),
            BackoffKind::Linear => Arc::new(LinearBackoff::new(
                self.initial_delay,
                self.initial_delay,
                max_delay,
            )),
            BackoffKind::Exponential => Arc::new(
                ExponentialBackoff::new(self.initial_delay)
                    .multiplier(self.multiplier)
                    .max_interval(max_delay)
                    .jitter_factor(jitter_factor),
            ),
        };

        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff,
            retry_on: self.retry_on,
            name: self.name,
            circuit_breaker: self.circuit_breaker,
        }
    }
}
