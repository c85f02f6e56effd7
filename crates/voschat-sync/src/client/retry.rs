//! Reconnect backoff for the realtime channel.
//!
//! REST calls are never retried implicitly; this policy only drives the
//! channel's reconnect loop.

use crate::client::utils::exponential_backoff;
use rand::Rng;
use std::time::Duration;

/// Configuration for reconnect backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Fraction of the exponential delay added as random jitter, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl BackoffConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Backoff state across consecutive failures.
///
/// Delays never decrease between resets and never exceed `max_backoff`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    last_delay: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
            last_delay: Duration::ZERO,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_delay(&mut self) -> Duration {
        let max = self.config.max_backoff;
        let base_ms = self.config.initial_backoff.as_millis() as u64;
        let raw = exponential_backoff(self.attempts, base_ms).min(max);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let spread_ms = (raw.as_millis() as f64 * jitter) as u64;
        let extra = if spread_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=spread_ms))
        } else {
            Duration::ZERO
        };

        let delay = (raw + extra).min(max).max(self.last_delay);
        self.attempts = self.attempts.saturating_add(1);
        self.last_delay = delay;
        delay
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_delay = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_are_monotonic_and_capped() {
        let config = BackoffConfig::new()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(5))
            .with_jitter(1.0);
        for _ in 0..50 {
            let mut backoff = Backoff::new(config.clone());
            let mut previous = Duration::ZERO;
            for _ in 0..20 {
                let delay = backoff.next_delay();
                assert!(delay >= previous, "{:?} < {:?}", delay, previous);
                assert!(delay <= config.max_backoff);
                previous = delay;
            }
            assert_eq!(previous, config.max_backoff);
        }
    }

    #[test]
    fn test_without_jitter_doubles() {
        let mut backoff = Backoff::new(
            BackoffConfig::new()
                .with_initial_backoff(Duration::from_millis(100))
                .with_max_backoff(Duration::from_millis(1000))
                .with_jitter(0.0),
        );
        let delays: Vec<u64> = (0..6)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = Backoff::new(
            BackoffConfig::new()
                .with_initial_backoff(Duration::from_millis(50))
                .with_jitter(0.0),
        );
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_out_of_range_jitter_is_clamped() {
        let mut backoff = Backoff::new(
            BackoffConfig::new()
                .with_initial_backoff(Duration::from_millis(10))
                .with_max_backoff(Duration::from_millis(15))
                .with_jitter(7.5),
        );
        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_millis(15));
        }
    }
}
