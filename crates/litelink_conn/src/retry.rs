//! Time-bounded busy-retry policy.

use crate::wake::WakeBroadcast;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long the blocking variant parks between polls.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Ephemeral state for one busy-retry loop.
///
/// The attempt counter is caller-managed: call [`advance`](Self::advance)
/// once per retry before consulting the policy. The elapsed-time
/// baseline resets only when the loop restarts from attempt 1, not on
/// every call.
#[derive(Debug)]
pub struct RetryState {
    attempts: u32,
    baseline: Instant,
}

impl RetryState {
    /// Creates state for a fresh retry loop.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempts: 0,
            baseline: Instant::now(),
        }
    }

    /// Records one more attempt.
    pub fn advance(&mut self) {
        self.attempts += 1;
    }

    /// Returns the number of attempts recorded so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether a busy operation should be retried.
///
/// Both variants share the timeout arithmetic: the baseline is reset on
/// the first attempt, and once elapsed time since the baseline exceeds
/// the configured timeout the policy rejects and the caller must fail.
pub struct BusyRetryPolicy {
    timeout: Duration,
    wake: Arc<WakeBroadcast>,
}

impl BusyRetryPolicy {
    /// Creates a policy bounded by `timeout`, parking on `wake`.
    #[must_use]
    pub fn new(timeout: Duration, wake: Arc<WakeBroadcast>) -> Self {
        Self { timeout, wake }
    }

    /// Blocking variant: approves after parking for at most
    /// [`RETRY_INTERVAL`], or rejects once the timeout is exceeded.
    ///
    /// The park ends early when any connection sharing the wake
    /// broadcast completes a mutating statement.
    pub fn should_retry_blocking(&self, state: &mut RetryState) -> bool {
        if !self.check_deadline(state) {
            return false;
        }
        self.wake.wait_for(RETRY_INTERVAL);
        true
    }

    /// Non-blocking variant: identical timeout check, never parks.
    ///
    /// For callers that must not block the calling thread (cooperative
    /// schedulers); they decide themselves how to wait between retries.
    pub fn should_retry(&self, state: &mut RetryState) -> bool {
        self.check_deadline(state)
    }

    fn check_deadline(&self, state: &mut RetryState) -> bool {
        if state.attempts <= 1 {
            state.baseline = Instant::now();
        }
        state.baseline.elapsed() <= self.timeout
    }
}

impl std::fmt::Debug for BusyRetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyRetryPolicy")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
