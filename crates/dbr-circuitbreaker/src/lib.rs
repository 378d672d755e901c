//! Circuit breaker (spec §4.C): a consecutive-failure gate per database target, consulted by
//! the retry engine before every attempt.

mod circuit;
mod config;
mod events;

pub use circuit::{CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
