//! Retry/backoff policy for throttled remote requests.
//!
//! Policy is data, not control flow: the schedule lives in a struct and the
//! sleep is injected, so throttling behavior is testable with a fake clock.

use crate::error::{CadenceError, Result};
use std::time::Duration;

/// Retry policy for a single remote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling, including the first attempt.
    pub max_attempts: u32,
    /// Waits applied before retrying a throttled attempt. Indexed by the
    /// number of throttles seen so far; the last entry repeats once the
    /// schedule is shorter than the attempt count.
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_secs(1),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry following the `throttle_count`-th throttle
    /// (1-based).
    #[must_use]
    pub fn wait_for(&self, throttle_count: u32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let idx = (throttle_count as usize - 1).min(self.backoff.len() - 1);
        self.backoff[idx]
    }
}

/// Outcome of one request attempt, as classified by the caller.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Success: short-circuits the retry loop immediately.
    Success(T),
    /// Throttling signal (HTTP 429): wait and retry per the schedule.
    Throttled,
}

/// Run `attempt` under `policy`, sleeping via `sleep` between throttled
/// attempts.
///
/// Non-throttling failures returned by `attempt` propagate immediately with
/// no retry; they are treated as non-transient.
///
/// # Errors
///
/// Returns [`CadenceError::RateLimitExhausted`] once `max_attempts` attempts
/// have all been throttled, or whatever error `attempt` itself produced.
pub fn execute<T>(
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
    attempt: &mut dyn FnMut() -> Result<Attempt<T>>,
) -> Result<T> {
    let mut throttles = 0u32;
    loop {
        match attempt()? {
            Attempt::Success(value) => return Ok(value),
            Attempt::Throttled => {
                throttles += 1;
                if throttles >= policy.max_attempts {
                    return Err(CadenceError::RateLimitExhausted {
                        attempts: policy.max_attempts,
                    });
                }
                let wait = policy.wait_for(throttles);
                tracing::warn!(
                    attempt = throttles,
                    max = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    "remote throttled request, backing off"
                );
                sleep(wait);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_short_circuits_without_sleeping() {
        let policy = RetryPolicy::default();
        let mut slept: Vec<Duration> = Vec::new();
        let mut sleep = |d: Duration| slept.push(d);
        let result =
            execute(&policy, &mut sleep, &mut || Ok(Attempt::Success(42))).unwrap();
        assert_eq!(result, 42);
        assert!(slept.is_empty());
    }

    #[test]
    fn test_throttle_schedule_is_monotone_and_bounded() {
        let policy = RetryPolicy::default();
        let mut slept: Vec<Duration> = Vec::new();
        let mut sleep = |d: Duration| slept.push(d);
        let mut calls = 0u32;
        let result = execute(&policy, &mut sleep, &mut || {
            calls += 1;
            if calls < 4 {
                Ok(Attempt::Throttled)
            } else {
                Ok(Attempt::Success("ok"))
            }
        })
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(
            slept,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_secs(1),
            ]
        );
        let mut sorted = slept.clone();
        sorted.sort();
        assert_eq!(sorted, slept);
    }

    #[test]
    fn test_exhaustion_raises_rate_limit_error() {
        let policy = RetryPolicy::default();
        let mut slept: Vec<Duration> = Vec::new();
        let mut sleep = |d: Duration| slept.push(d);
        let err = execute::<()>(&policy, &mut sleep, &mut || Ok(Attempt::Throttled)).unwrap_err();
        assert!(matches!(
            err,
            CadenceError::RateLimitExhausted { attempts: 5 }
        ));
        // Four waits precede the fifth and final throttled attempt.
        assert_eq!(slept.len(), 4);
    }

    #[test]
    fn test_non_throttle_failure_propagates_without_retry() {
        let policy = RetryPolicy::default();
        let mut slept: Vec<Duration> = Vec::new();
        let mut sleep = |d: Duration| slept.push(d);
        let mut calls = 0u32;
        let err = execute::<()>(&policy, &mut sleep, &mut || {
            calls += 1;
            Err(CadenceError::RemoteRequestFailed {
                status: 500,
                body: "boom".to_string(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, CadenceError::RemoteRequestFailed { status: 500, .. }));
        assert_eq!(calls, 1);
        assert!(slept.is_empty());
    }

    #[test]
    fn test_wait_for_clamps_to_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(4), Duration::from_secs(5));
        assert_eq!(policy.wait_for(40), Duration::from_secs(5));
    }
}
