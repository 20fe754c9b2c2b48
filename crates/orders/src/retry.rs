//! Backoff policy for order-book submission.
//!
//! Attempt `n` (1-based) waits `base * multiplier^(n-1)`, capped at `max`,
//! then spread by ±`jitter_factor`. A server-supplied retry-after wins when
//! it is longer.

use condswap_core::RetryConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

impl BackoffPolicy {
    /// Policy with no waiting between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// True if another attempt may follow attempt `attempt` (1-based).
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt after `attempt`, without jitter.
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64).max(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(capped as u64)
    }

    /// Jittered delay, raised to `retry_after` when the server asked for longer.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.base_delay_for(attempt);
        let jittered = apply_jitter(base, self.jitter_factor).min(self.max_delay);
        match retry_after {
            Some(server) if server > jittered => server,
            _ => jittered,
        }
    }
}

fn apply_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    let ms = delay.as_millis() as f64;
    let spread = ms * jitter_factor;
    let jittered = rand::thread_rng().gen_range((ms - spread).max(0.0)..=ms + spread);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Duration::from_millis(jittered as u64)
}
