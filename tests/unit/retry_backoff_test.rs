// Payment retry backoff: delay doubles per attempt, the schedule clears at
// the retry cap, and permanent error classes are never retried.

use chrono::{Duration, Utc};

use meterbill::core::AppError;
use meterbill::modules::payments::services::backoff::{next_retry_at, retry_delay};

#[test]
fn test_delay_schedule_default_base() {
    // base 24h: 24, 48, 96 hours
    assert_eq!(retry_delay(24, 0), Duration::hours(24));
    assert_eq!(retry_delay(24, 1), Duration::hours(48));
    assert_eq!(retry_delay(24, 2), Duration::hours(96));
}

#[test]
fn test_delay_schedule_custom_base() {
    assert_eq!(retry_delay(6, 0), Duration::hours(6));
    assert_eq!(retry_delay(6, 4), Duration::hours(96));
}

#[test]
fn test_final_attempt_clears_schedule() {
    let now = Utc::now();
    // Three allowed retries: attempts 0..2 schedule, attempt 3 does not
    assert_eq!(next_retry_at(now, 24, 0, 3), Some(now + Duration::hours(24)));
    assert_eq!(next_retry_at(now, 24, 1, 3), Some(now + Duration::hours(48)));
    assert_eq!(next_retry_at(now, 24, 2, 3), Some(now + Duration::hours(96)));
    assert_eq!(next_retry_at(now, 24, 3, 3), None);
}

#[test]
fn test_attempt_equal_to_cap_is_last() {
    let now = Utc::now();
    let max_retries = 3;
    // The attempt whose number reaches the cap clears the schedule
    let attempt_number = 3;
    assert!(next_retry_at(now, 24, attempt_number, max_retries).is_none());
    assert!(next_retry_at(now, 24, attempt_number - 1, max_retries).is_some());
}

#[test]
fn test_retry_disabled_by_zero_cap() {
    assert!(next_retry_at(Utc::now(), 24, 0, 0).is_none());
}

#[test]
fn test_non_retryable_error_classes() {
    // Validation, authorization, not-found, conflict: never retried
    assert!(!AppError::validation("bad payload").is_retryable());
    assert!(!AppError::unauthorized("bad key").is_retryable());
    assert!(!AppError::not_found("order").is_retryable());
    assert!(!AppError::conflict("duplicate").is_retryable());
    assert!(!AppError::integrity("sum mismatch").is_retryable());
}

#[test]
fn test_transient_error_classes_retry() {
    assert!(AppError::payment("gateway 502").is_retryable());
    assert!(AppError::internal("temporary").is_retryable());
}
