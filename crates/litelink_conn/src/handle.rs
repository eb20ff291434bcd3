//! Session handle wrapping an engine handle with wake signaling.

use crate::wake::WakeBroadcast;
use litelink_engine::{BusyHandler, EngineHandle, EngineResult, OpenMode};
use std::sync::Arc;

/// An engine handle wired to a wake broadcast.
///
/// Every successful statement signals the broadcast, so threads parked
/// in a busy wait on the same broadcast re-poll immediately. Statement
/// and metadata collaborators execute through this wrapper rather than
/// the raw engine handle to keep that semantic.
pub struct SessionHandle {
    inner: Box<dyn EngineHandle>,
    wake: Arc<WakeBroadcast>,
}

impl SessionHandle {
    pub(crate) fn new(inner: Box<dyn EngineHandle>, wake: Arc<WakeBroadcast>) -> Self {
        Self { inner, wake }
    }

    /// Executes a statement, signaling the wake broadcast on success.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged on failure; no signal is
    /// sent in that case.
    pub fn execute(&mut self, sql: &str) -> EngineResult<()> {
        self.inner.execute(sql)?;
        self.wake.notify_all();
        Ok(())
    }

    /// Returns the mode this session was opened in.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.inner.mode()
    }

    /// Returns true while the session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Returns the raw engine handle for collaborator layers.
    pub fn engine_handle_mut(&mut self) -> &mut dyn EngineHandle {
        self.inner.as_mut()
    }

    pub(crate) fn apply_key(&mut self, passphrase: &str) -> EngineResult<()> {
        self.inner.apply_key(passphrase)
    }

    pub(crate) fn set_busy_handler(&mut self, handler: Option<BusyHandler>) {
        self.inner.set_busy_handler(handler);
    }

    pub(crate) fn close(&mut self) -> EngineResult<()> {
        self.inner.close()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("mode", &self.mode())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
