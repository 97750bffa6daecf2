use std::time::Duration;

use tickdag::retry::{RetryPolicy, DEFAULT_RETRY_DELAY};
use tickdag::types::BackoffStrategy;

#[test]
fn default_policy_never_retries() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 0);
    assert_eq!(policy.retry_delay, DEFAULT_RETRY_DELAY);
    assert_eq!(policy.backoff, BackoffStrategy::Fixed);
    assert!(!policy.should_retry(1));
}

#[test]
fn should_retry_counts_failed_attempts_from_one() {
    let policy = RetryPolicy::fixed(3, Duration::from_secs(300));

    assert!(!policy.should_retry(0));
    assert!(policy.should_retry(1));
    assert!(policy.should_retry(2));
    assert!(policy.should_retry(3));
    assert!(!policy.should_retry(4));
}

#[test]
fn fixed_backoff_uses_base_delay() {
    let policy = RetryPolicy::fixed(2, Duration::from_secs(300));
    assert_eq!(policy.backoff_delay(1), Duration::from_secs(300));
    assert_eq!(policy.backoff_delay(2), Duration::from_secs(300));
}

#[test]
fn exponential_backoff_doubles_and_caps() {
    let policy = RetryPolicy::fixed(5, Duration::from_secs(10))
        .with_exponential_backoff(Some(Duration::from_secs(60)));

    assert_eq!(policy.backoff_delay(1), Duration::from_secs(10));
    assert_eq!(policy.backoff_delay(2), Duration::from_secs(20));
    assert_eq!(policy.backoff_delay(3), Duration::from_secs(40));
    assert_eq!(policy.backoff_delay(4), Duration::from_secs(60));
    assert_eq!(policy.backoff_delay(40), Duration::from_secs(60));
}

#[test]
fn none_policy_gives_up_immediately() {
    let policy = RetryPolicy::none();
    assert!(!policy.should_retry(1));
    assert_eq!(policy.backoff_delay(1), Duration::ZERO);
}
