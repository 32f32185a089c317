//! Tests for restart policy and exit classification.

use std::time::Duration;

use frame_supervisor::supervisor::{
    BackoffStrategy, ExitClassification, RestartPolicy, DEFAULT_RESTART_DELAY,
    TERMINATED_EXIT_CODE,
};

#[test]
fn default_policy_is_one_second_forever() {
    let policy = RestartPolicy::default();
    assert_eq!(policy.delay, DEFAULT_RESTART_DELAY);
    assert_eq!(DEFAULT_RESTART_DELAY, Duration::from_secs(1));
    assert_eq!(policy.backoff, BackoffStrategy::Fixed);
    assert!(policy.max_restarts.is_none());
    assert_eq!(policy.next_delay(u32::MAX), Some(DEFAULT_RESTART_DELAY));
}

#[test]
fn zero_max_restarts_never_restarts() {
    let policy = RestartPolicy::default().with_max_restarts(0);
    assert!(policy.next_delay(1).is_none());
}

#[test]
fn exponential_backoff_doubles() {
    let policy = RestartPolicy::fixed(Duration::from_millis(50))
        .with_exponential_backoff(Duration::from_secs(10));
    let delays: Vec<_> = (1..=4).filter_map(|n| policy.next_delay(n)).collect();
    assert_eq!(
        delays,
        [
            Duration::from_millis(50),
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400)
        ]
    );
}

#[test]
fn exit_codes_classified() {
    assert_eq!(ExitClassification::from_code(0), ExitClassification::Restart);
    assert_eq!(
        ExitClassification::from_code(TERMINATED_EXIT_CODE),
        ExitClassification::Terminated
    );
    assert_eq!(
        ExitClassification::from_code(1),
        ExitClassification::Abnormal(1)
    );
}

#[cfg(unix)]
#[test]
fn only_stop_signals_are_intentional() {
    assert_eq!(ExitClassification::from_signal(2), ExitClassification::Terminated);
    assert_eq!(ExitClassification::from_signal(9), ExitClassification::Terminated);
    assert_eq!(ExitClassification::from_signal(15), ExitClassification::Terminated);
    assert_eq!(ExitClassification::from_signal(6), ExitClassification::Crashed(6));
    assert_eq!(ExitClassification::from_signal(11), ExitClassification::Crashed(11));
}
