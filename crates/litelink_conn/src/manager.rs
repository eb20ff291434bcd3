//! Handle acquisition and session initialization.

use crate::error::{ConnError, ConnResult};
use crate::handle::SessionHandle;
use crate::retry::{BusyRetryPolicy, RetryState};
use crate::wake::WakeBroadcast;
use litelink_engine::{Engine, EngineHandle, EngineResult, EngineVersion, OpenMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Typed-result reporting is available from this engine version on.
const TYPED_RESULTS_MIN: EngineVersion = EngineVersion::new(2, 6, 0);

/// Session-initialization control statements, run in order on every
/// freshly opened handle.
const INIT_PRAGMAS: [&str; 3] = [
    "PRAGMA short_column_names = off;",
    "PRAGMA full_column_names = on;",
    "PRAGMA empty_result_callbacks = on;",
];

const TYPED_RESULTS_PRAGMA: &str = "PRAGMA show_datatypes = on;";

/// Opens engine handles and brings them to a usable session state.
///
/// The manager owns the open-time busy-retry loop: if any
/// initialization statement hits a busy engine, the whole sequence is
/// restarted under the blocking [`BusyRetryPolicy`] until it succeeds
/// or the time budget runs out. A handle never leaks on any exit path.
pub struct ConnectionManager {
    engine: Arc<dyn Engine>,
    encoding: String,
    vfs: Option<String>,
    timeout: Duration,
    wake: Arc<WakeBroadcast>,
}

impl ConnectionManager {
    /// Creates a manager for the given engine and session settings.
    pub fn new(
        engine: Arc<dyn Engine>,
        encoding: impl Into<String>,
        vfs: Option<String>,
        timeout: Duration,
        wake: Arc<WakeBroadcast>,
    ) -> Self {
        Self {
            engine,
            encoding: encoding.into(),
            vfs,
            timeout,
            wake,
        }
    }

    /// Opens a handle in the requested mode and runs session
    /// initialization.
    ///
    /// # Errors
    ///
    /// - [`ConnError::BusyTimeout`] if initialization stayed busy past
    ///   the time budget
    /// - [`ConnError::Engine`] for any other engine failure
    ///
    /// In both cases the partially-opened handle is closed before the
    /// error propagates.
    pub fn open(&self, path: &str, mode: OpenMode) -> ConnResult<SessionHandle> {
        let mut handle = self.engine.open(path, mode, self.vfs.as_deref())?;

        if let Err(e) = handle.set_encoding(&self.encoding) {
            let _ = handle.close();
            return Err(e.into());
        }

        let policy = BusyRetryPolicy::new(self.timeout, Arc::clone(&self.wake));
        let mut retry = RetryState::new();
        loop {
            match self.run_init_sequence(handle.as_mut()) {
                Ok(()) => break,
                Err(e) if e.is_busy() => {
                    retry.advance();
                    if !policy.should_retry_blocking(&mut retry) {
                        debug!(
                            path,
                            attempts = retry.attempts(),
                            "giving up on busy session initialization"
                        );
                        let code = e.code();
                        let _ = handle.close();
                        return Err(ConnError::BusyTimeout { code });
                    }
                }
                Err(e) => {
                    let _ = handle.close();
                    return Err(e.into());
                }
            }
        }

        debug!(path, ?mode, "session initialized");
        Ok(SessionHandle::new(handle, Arc::clone(&self.wake)))
    }

    /// Returns true if the engine runs with shared-cache mode enabled.
    #[must_use]
    pub fn shared_cache_enabled(&self) -> bool {
        self.engine.shared_cache_enabled()
    }

    /// Returns the session encoding this manager applies.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Returns the wake broadcast handles are wired to.
    #[must_use]
    pub fn wake(&self) -> &Arc<WakeBroadcast> {
        &self.wake
    }

    fn run_init_sequence(&self, handle: &mut dyn EngineHandle) -> EngineResult<()> {
        for sql in INIT_PRAGMAS {
            handle.execute(sql)?;
        }
        if self.engine.version() >= TYPED_RESULTS_MIN {
            handle.execute(TYPED_RESULTS_PRAGMA)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("encoding", &self.encoding)
            .field("vfs", &self.vfs)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
