//! Backoff strategies (spec §4.B).
//!
//! Generalizes `tower-resilience-retry`'s `IntervalFunction` trait (`FixedInterval`,
//! `ExponentialBackoff`, `ExponentialRandomBackoff`) into a small strategy trait shared by
//! the retry engine, the transaction manager's deadlock/serialization retry loop, and the
//! replica router's reconnect loop.

use std::time::Duration;

/// Computes the delay to wait before a retry attempt.
///
/// `attempt` is 0-indexed: `attempt == 0` is the delay before the *first* retry (i.e. after
/// the initial attempt failed).
pub trait BackoffStrategy: Send + Sync {
    fn delay_for(&self, attempt: u32) -> Duration;
}

/// A fixed delay between every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// A delay that grows linearly: `initial + attempt * increment`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    initial: Duration,
    increment: Duration,
    max: Duration,
}

impl LinearBackoff {
    pub fn new(initial: Duration, increment: Duration, max: Duration) -> Self {
        Self {
            initial,
            increment,
            max,
        }
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let grown = self.increment.saturating_mul(attempt);
        self.initial.saturating_add(grown).min(self.max)
    }
}

/// An exponentially growing delay with optional jitter, the spec's default policy.
///
/// `delay = min(initial * multiplier^attempt, max)`, then randomized by up to
/// `jitter_factor` in either direction (e.g. `jitter_factor = 0.2` produces a delay between
/// 80% and 120% of the computed value). A `multiplier^attempt` overflow (attempt exponent at
/// or beyond 30) saturates at `max` rather than panicking or wrapping.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    jitter_factor: f64,
}

/// Exponent beyond which `multiplier.powi(n)` risks overflowing to infinity for any
/// multiplier greater than 1.0; attempts at or beyond this saturate at `max` directly.
const OVERFLOW_GUARD_EXPONENT: u32 = 30;

impl ExponentialBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(30),
            jitter_factor: 0.0,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Sets the jitter factor, clamped to `[0.0, 1.0]`.
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        if attempt >= OVERFLOW_GUARD_EXPONENT {
            return self.max;
        }

        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        if !scaled.is_finite() || scaled < 0.0 {
            return self.max;
        }

        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }

        let offset: f64 = rand::random_range(-self.jitter_factor..=self.jitter_factor);
        let jittered = base.as_secs_f64() * (1.0 + offset);
        Duration::try_from_secs_f64(jittered.max(0.0))
            .unwrap_or(base)
            .min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_backoff_never_changes() {
        let backoff = FixedBackoff::new(Duration::from_millis(50));
        assert_eq!(backoff.delay_for(0), Duration::from_millis(50));
        assert_eq!(backoff.delay_for(100), Duration::from_millis(50));
    }

    #[test]
    fn linear_backoff_grows_by_increment_and_caps() {
        let backoff = LinearBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(50),
            Duration::from_millis(220),
        );
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(150));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(220));
    }

    #[test]
    fn exponential_backoff_doubles_by_default() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .max_interval(Duration::from_secs(10));
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(400));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn exponential_backoff_respects_max_interval() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .multiplier(2.0)
            .max_interval(Duration::from_millis(500));
        assert_eq!(backoff.delay_for(10), Duration::from_millis(500));
    }

    #[test]
    fn exponential_backoff_saturates_past_overflow_guard() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .multiplier(2.0)
            .max_interval(Duration::from_secs(60));
        assert_eq!(backoff.delay_for(1000), Duration::from_secs(60));
    }

    #[test]
    fn jitter_factor_is_clamped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100)).jitter_factor(5.0);
        for attempt in 0..5 {
            let delay = backoff.delay_for(attempt);
            assert!(delay <= backoff.max);
        }
    }

    proptest! {
        #[test]
        fn exponential_backoff_never_exceeds_max(
            initial_ms in 1u64..1000,
            multiplier in 1.0f64..4.0,
            max_ms in 1u64..60_000,
            attempt in 0u32..64,
            jitter in 0.0f64..1.0,
        ) {
            let backoff = ExponentialBackoff::new(Duration::from_millis(initial_ms))
                .multiplier(multiplier)
                .max_interval(Duration::from_millis(max_ms))
                .jitter_factor(jitter);
            let delay = backoff.delay_for(attempt);
            prop_assert!(delay <= Duration::from_millis(max_ms));
        }

        #[test]
        fn linear_backoff_is_monotonically_non_decreasing(
            initial_ms in 1u64..1000,
            increment_ms in 0u64..1000,
            max_ms in 1000u64..60_000,
        ) {
            let backoff = LinearBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(increment_ms),
                Duration::from_millis(max_ms),
            );
            let mut previous = backoff.delay_for(0);
            for attempt in 1..32 {
                let next = backoff.delay_for(attempt);
                prop_assert!(next >= previous);
                previous = next;
            }
        }
    }
}
