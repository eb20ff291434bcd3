//! Wait/notify coordination for busy waits.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A broadcast point shared by busy-waiting threads.
///
/// Every successful mutating statement signals the broadcast, so
/// threads parked in a busy wait re-poll as soon as contention may have
/// cleared instead of sleeping out their full interval.
///
/// By default each [`crate::Connection`] creates its own broadcast.
/// Passing one shared instance to several connections (via
/// [`crate::ConnectionConfig::wake_broadcast`]) restores the
/// process-wide behavior: any connection's successful statement wakes
/// every blocked thread. That shortens worst-case poll latency at the
/// cost of a process-wide contention point.
///
/// Safe for concurrent signalers and waiters.
#[derive(Debug, Default)]
pub struct WakeBroadcast {
    lock: Mutex<()>,
    cond: Condvar,
}

impl WakeBroadcast {
    /// Creates a new broadcast with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every thread currently blocked in [`wait_for`](Self::wait_for).
    pub fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Blocks the calling thread until notified or `timeout` elapses.
    ///
    /// Returns true if the wait ended because of a notification.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        !self.cond.wait_for(&mut guard, timeout).timed_out()
    }
}
