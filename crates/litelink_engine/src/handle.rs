//! Engine and handle trait definitions.

use crate::error::EngineResult;
use crate::version::EngineVersion;

/// Busy handler capability installed on a handle.
///
/// The engine invokes the handler whenever a statement hits a locked
/// resource, passing the number of times it has been invoked for the
/// current contention (starting at 1). Returning `true` asks the engine
/// to retry; returning `false` makes the statement fail with a busy
/// error.
pub type BusyHandler = Box<dyn FnMut(u32) -> bool + Send>;

/// Mode a session is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing database for reading only.
    ReadOnly,
    /// Open for reading and writing, creating the database if missing.
    ReadWriteCreate,
}

/// An embedded database engine that can open sessions.
///
/// Implementors bind a concrete native library. The connection layer
/// treats the engine as a session factory plus a few capability probes;
/// all lifecycle and retry policy lives above this seam.
pub trait Engine: Send + Sync {
    /// Opens a new session against the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot open the database in the
    /// requested mode.
    fn open(&self, path: &str, mode: OpenMode, vfs: Option<&str>)
        -> EngineResult<Box<dyn EngineHandle>>;

    /// Returns the engine library version.
    fn version(&self) -> EngineVersion;

    /// Returns true if the engine runs with shared-cache mode enabled.
    ///
    /// Shared cache is a precondition for the read-uncommitted
    /// isolation relaxation.
    fn shared_cache_enabled(&self) -> bool;
}

/// One open session against the engine.
///
/// A handle is exclusively owned: the connection layer guarantees that
/// at most one handle per logical connection is ever visible to
/// callers.
pub trait EngineHandle: Send {
    /// Executes a single statement.
    ///
    /// If a busy handler is installed, the engine consults it before
    /// reporting a busy condition.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails or the handle is closed.
    fn execute(&mut self, sql: &str) -> EngineResult<()>;

    /// Sets the session character encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding is rejected or the handle is
    /// closed.
    fn set_encoding(&mut self, encoding: &str) -> EngineResult<()>;

    /// Applies an encryption passphrase to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the key or the handle is
    /// closed.
    fn apply_key(&mut self, passphrase: &str) -> EngineResult<()>;

    /// Installs or removes the busy handler for this session.
    fn set_busy_handler(&mut self, handler: Option<BusyHandler>);

    /// Returns the mode this session was opened in.
    fn mode(&self) -> OpenMode;

    /// Returns true while the session is open.
    fn is_open(&self) -> bool;

    /// Closes the session, releasing the native resources.
    ///
    /// Closing an already-closed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to release the session.
    fn close(&mut self) -> EngineResult<()>;
}
