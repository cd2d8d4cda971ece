//! Retry logic for network operations with fault classification and exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{ExternalServiceError, Fault, FaultKind};

/// Default maximum number of attempts for one operation.
pub const MAX_RETRIES: u32 = 3;

/// Default wait before the second attempt, in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Default ceiling for the wait between attempts, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 8000;

/// Verdict of the fault classifier for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: FaultKind,
    pub retryable: bool,
    pub reason: &'static str,
}

impl Classification {
    fn new(kind: FaultKind, reason: &'static str) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            reason,
        }
    }
}

/// Classifies a failed attempt as retryable or not.
pub fn classify(fault: &Fault) -> Classification {
    match fault {
        Fault::Network(_) => Classification::new(
            FaultKind::Transport,
            "no response received from the server",
        ),
        Fault::Status(429) => Classification::new(FaultKind::Server, "rate limited by the server"),
        // Other 4xx client errors won't succeed on retry
        Fault::Status(code) if (400..500).contains(code) => Classification::new(
            FaultKind::Client,
            "request rejected by the server",
        ),
        Fault::Status(_) => Classification::new(FaultKind::Server, "server error"),
        // Unknown transport failures fail open, bounded by the attempt ceiling
        Fault::Other(_) => Classification::new(
            FaultKind::Transport,
            "unrecognised transport failure",
        ),
    }
}

/// Attempt ceiling and backoff bounds for one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Total number of invocations allowed. A ceiling of zero still allows one attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            MAX_RETRIES,
            Duration::from_millis(INITIAL_BACKOFF_MS),
            Duration::from_millis(MAX_BACKOFF_MS),
        )
    }
}

/// Mutable retry bookkeeping owned by a single operation.
///
/// The backoff doubles after every failure and never exceeds the policy's
/// ceiling. No jitter is applied.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts_made: u32,
    current_backoff: Duration,
    max_backoff: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts_made: 0,
            current_backoff: policy.initial_backoff.min(policy.max_backoff),
            max_backoff: policy.max_backoff,
        }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    /// Records a failed attempt and returns how long to wait before the next one.
    pub fn record_failure(&mut self) -> Duration {
        self.attempts_made += 1;
        let wait = self.current_backoff;
        self.current_backoff = self
            .current_backoff
            .saturating_mul(2)
            .min(self.max_backoff);
        wait
    }
}

/// Executes an async operation, retrying transient faults with exponential backoff.
///
/// Returns as soon as an attempt succeeds. Client faults fail immediately;
/// retryable faults are retried until `policy.max_attempts()` invocations
/// have been made. The wait happens after the failure is classified and
/// before the next attempt.
pub async fn execute_with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ExternalServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Fault>>,
{
    let max_attempts = policy.max_attempts();
    let mut state = RetryState::new(policy);

    loop {
        let attempt = state.attempts_made() + 1;
        debug!("{}: attempt {}/{}", operation_name, attempt, max_attempts);

        let fault = match operation().await {
            Ok(result) => return Ok(result),
            Err(fault) => fault,
        };

        let classification = classify(&fault);

        if !classification.retryable {
            error!(
                status = ?status_of(&fault),
                "{}: non-retryable failure on attempt {} ({}): {}",
                operation_name, attempt, classification.reason, fault
            );
            return Err(ExternalServiceError::rejected(
                operation_name,
                fault,
                classification.kind,
                attempt,
            ));
        }

        if attempt >= max_attempts {
            error!(
                status = ?status_of(&fault),
                "{}: giving up after {} attempts ({}): {}",
                operation_name, attempt, classification.reason, fault
            );
            return Err(ExternalServiceError::exhausted(
                operation_name,
                fault,
                classification.kind,
                attempt,
            ));
        }

        let wait = state.record_failure();
        warn!(
            status = ?status_of(&fault),
            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
            operation_name,
            attempt,
            max_attempts,
            fault,
            wait.as_millis()
        );
        tokio::time::sleep(wait).await;
    }
}

fn status_of(fault: &Fault) -> Option<u16> {
    match fault {
        Fault::Status(code) => Some(*code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_secs(1), Duration::from_secs(8))
    }

    #[test]
    fn test_classify_retryable_statuses() {
        for code in [500, 502, 503, 504, 429] {
            let c = classify(&Fault::Status(code));
            assert!(c.retryable, "HTTP {} should be retryable", code);
            assert_eq!(c.kind, FaultKind::Server);
        }
    }

    #[test]
    fn test_classify_client_errors_not_retryable() {
        for code in (400..500).filter(|c| *c != 429) {
            let c = classify(&Fault::Status(code));
            assert!(!c.retryable, "HTTP {} should not be retryable", code);
            assert_eq!(c.kind, FaultKind::Client);
        }
    }

    #[test]
    fn test_classify_network_error() {
        let c = classify(&Fault::Network("connection refused".into()));
        assert!(c.retryable);
        assert_eq!(c.kind, FaultKind::Transport);
    }

    #[test]
    fn test_classify_unknown_transport_error_fails_open() {
        let c = classify(&Fault::Other("error decoding response body".into()));
        assert!(c.retryable);
        assert_eq!(c.kind, FaultKind::Transport);
    }

    #[test]
    fn test_classify_unusual_status_is_retryable() {
        assert!(classify(&Fault::Status(600)).retryable);
        assert!(classify(&Fault::Status(304)).retryable);
    }

    #[test]
    fn test_backoff_sequence_is_capped() {
        let mut state = RetryState::new(&policy(10));
        let waits: Vec<u64> = (0..6).map(|_| state.record_failure().as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(state.attempts_made(), 6);
    }

    #[test]
    fn test_initial_backoff_above_ceiling_is_clamped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(20), Duration::from_secs(8));
        let mut state = RetryState::new(&policy);
        assert_eq!(state.current_backoff(), Duration::from_secs(8));
        assert_eq!(state.record_failure(), Duration::from_secs(8));
        assert_eq!(state.current_backoff(), Duration::from_secs(8));
    }

    #[test]
    fn test_zero_ceiling_allows_one_attempt() {
        assert_eq!(policy(0).max_attempts(), 1);
        assert_eq!(policy(5).max_attempts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_success() {
        let result = execute_with_retry("test", &policy(3), || async { Ok::<_, Fault>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_with_retry_retries_then_succeeds() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = execute_with_retry("test", &policy(5), || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 3 {
                    Err(Fault::Status(503))
                } else {
                    Ok("success after retries")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success after retries");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_with_retry_exhausts_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = execute_with_retry("test", &policy(3), || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Fault::Network("connection timeout".into()))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert!(err.is_retryable());
        assert_eq!(err.kind(), FaultKind::Transport);
        assert_eq!(err.attempts(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_immediate_failure_on_non_retryable() {
        let start = Instant::now();
        let mut calls = 0;

        let result = execute_with_retry("test", &policy(3), || {
            calls += 1;
            async { Err::<(), _>(Fault::Status(404)) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls, 1);
        assert!(!err.is_exhausted());
        assert_eq!(err.kind(), FaultKind::Client);
        assert_eq!(err.status(), Some(404));
        // No backoff was slept
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_waits_between_attempts() {
        let mut started = Vec::new();
        let origin = Instant::now();

        let result = execute_with_retry("test", &policy(6), || {
            started.push(origin.elapsed());
            async { Err::<(), _>(Fault::Status(500)) }
        })
        .await;

        assert!(result.unwrap_err().is_exhausted());
        let gaps: Vec<u64> = started
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 4, 8, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_rate_limit_is_retried() {
        let mut calls = 0;

        let result = execute_with_retry("test", &policy(3), || {
            calls += 1;
            let outcome = if calls == 1 {
                Err(Fault::Status(429))
            } else {
                Ok(vec![1, 2, 3])
            };
            async move { outcome }
        })
        .await;

        assert_eq!(result.unwrap(), vec![1, 2, 3]);
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_client_error_after_server_error() {
        let mut calls = 0;

        let result = execute_with_retry("test", &policy(5), || {
            calls += 1;
            let fault = if calls == 1 {
                Fault::Status(502)
            } else {
                Fault::Status(400)
            };
            async move { Err::<(), _>(fault) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_exhausted());
    }
}
