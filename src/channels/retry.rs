//! Reconnect backoff for the messaging session

use std::time::{Duration, SystemTime};

/// Retry policy for establishing the messaging session
///
/// Controls how many connection attempts are made and how long to wait
/// between them using exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts
    pub max_attempts: u32,
    /// Base delay between attempts (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Determine whether a failed probe is worth retrying.
///
/// Rate limits (429) and server errors (5xx) are transient. Other client
/// errors mean the credentials or phone number id are wrong, and retrying
/// will not help.
#[must_use]
pub fn is_recoverable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Compute the delay before the given attempt (0-based).
///
/// Follows `min(base_delay * 2^attempt + jitter, max_delay)` where jitter is
/// 0-25% of the computed delay, derived from `SystemTime` to avoid pulling in
/// a random number generator.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let base = base.min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}
