//! Bounded reconnection policy for the socket channel.
//!
//! After an unexpected close the channel schedules at most
//! [`RetryPolicy::max_attempts`] automatic reconnects. The default policy
//! waits a constant 5 s between attempts and gives up after 5; an
//! exponential policy can be injected instead.

use std::time::Duration;

/// Delay before an automatic reconnect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Automatic reconnects allowed before the channel goes dormant.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// How the delay evolves between consecutive attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Every attempt waits [`RetryPolicy::delay`].
    Fixed,
    /// The first attempt waits [`RetryPolicy::delay`]; each following one
    /// multiplies the previous delay, clamped to `max_delay`.
    Exponential { multiplier: f64, max_delay: Duration },
}

/// Tunable parameters for automatic reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first automatic attempt.
    pub delay: Duration,
    /// Upper bound on automatic attempts between two user-initiated
    /// connects.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Exponential policy starting at `delay`, doubling up to `max_delay`.
    pub fn exponential(delay: Duration, max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            delay,
            max_attempts,
            backoff: Backoff::Exponential {
                multiplier: 2.0,
                max_delay,
            },
        }
    }

    /// Delay to wait before automatic attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => {
                let mut delay = self.delay.min(*max_delay);
                for _ in 1..attempt {
                    delay = next_delay(delay, *multiplier, *max_delay);
                    if delay == *max_delay {
                        break;
                    }
                }
                delay
            }
        }
    }

    /// Whether another automatic attempt is allowed after `attempts`
    /// have already been made.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Calculate the next backoff delay from the current one.
///
/// The result is clamped to `max_delay`.
pub fn next_delay(current: Duration, multiplier: f64, max_delay: Duration) -> Duration {
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms).min(max_delay)
}
