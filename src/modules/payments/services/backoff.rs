//! Retry backoff arithmetic for failed payments.
//!
//! Delay doubles per attempt from a configurable base:
//! `delay = base_hours * 2^attempt`. The scheduler clears `next_retry_at`
//! once the attempt counter reaches the cap, after which only an operator
//! can resurrect the payment.

use chrono::{DateTime, Duration, Utc};

/// Delay before retry number `attempt` (0-based)
pub fn retry_delay(base_hours: i64, attempt: i32) -> Duration {
    let factor = 1i64 << attempt.clamp(0, 30);
    Duration::hours(base_hours.saturating_mul(factor))
}

/// When the next retry should run, or None once attempts are exhausted.
///
/// `attempts_made` counts retries already performed; the cap comes from the
/// payment row's `max_retries`.
pub fn next_retry_at(
    now: DateTime<Utc>,
    base_hours: i64,
    attempts_made: i32,
    max_retries: i32,
) -> Option<DateTime<Utc>> {
    if attempts_made >= max_retries {
        return None;
    }
    Some(now + retry_delay(base_hours, attempts_made))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        assert_eq!(retry_delay(24, 0), Duration::hours(24));
        assert_eq!(retry_delay(24, 1), Duration::hours(48));
        assert_eq!(retry_delay(24, 2), Duration::hours(96));
        assert_eq!(retry_delay(6, 3), Duration::hours(48));
    }

    #[test]
    fn test_next_retry_cleared_at_cap() {
        let now = Utc::now();
        assert!(next_retry_at(now, 24, 0, 3).is_some());
        assert!(next_retry_at(now, 24, 2, 3).is_some());
        assert!(next_retry_at(now, 24, 3, 3).is_none());
        assert!(next_retry_at(now, 24, 5, 3).is_none());
    }

    #[test]
    fn test_zero_max_retries_never_schedules() {
        let now = Utc::now();
        assert!(next_retry_at(now, 24, 0, 0).is_none());
    }
}
