//! In-memory engine for testing.

use crate::error::{EngineError, EngineResult, CODE_ERROR};
use crate::handle::{BusyHandler, Engine, EngineHandle, OpenMode};
use crate::version::EngineVersion;
use parking_lot::Mutex;
use std::sync::Arc;

/// A scriptable in-memory engine.
///
/// This engine executes no SQL; it records every statement and open
/// request, and lets tests script failures:
///
/// - busy conditions for the next N statements, or forever
/// - open failures for the next N open requests
/// - statement failures by substring match
/// - close and key-application failures
///
/// All handles opened from one engine share the same scripted state, so
/// a test can keep mutating the script after the code under test has
/// taken its handles.
///
/// # Example
///
/// ```rust
/// use litelink_engine::{Engine, EngineHandle, MemoryEngine, OpenMode};
///
/// let engine = MemoryEngine::new();
/// engine.make_busy(2);
///
/// let mut handle = engine.open("/tmp/t.db", OpenMode::ReadWriteCreate, None).unwrap();
/// assert!(handle.execute("BEGIN").is_err());
/// assert!(handle.execute("BEGIN").is_err());
/// assert!(handle.execute("BEGIN").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    state: Arc<Mutex<Script>>,
    version: EngineVersion,
    shared_cache: bool,
}

#[derive(Debug, Default)]
struct Script {
    busy_statements: u32,
    always_busy: bool,
    fail_opens: u32,
    fail_statements_containing: Option<String>,
    fail_closes: u32,
    fail_keys: bool,
    statements: Vec<String>,
    opens: Vec<(String, OpenMode)>,
    keys: Vec<String>,
    open_handles: usize,
}

impl MemoryEngine {
    /// Creates an engine reporting version 3.7.0 without shared cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Script::default())),
            version: EngineVersion::new(3, 7, 0),
            shared_cache: false,
        }
    }

    /// Sets the version the engine reports.
    #[must_use]
    pub fn with_version(mut self, version: EngineVersion) -> Self {
        self.version = version;
        self
    }

    /// Sets whether the engine reports shared-cache support.
    #[must_use]
    pub fn with_shared_cache(mut self, enabled: bool) -> Self {
        self.shared_cache = enabled;
        self
    }

    /// Scripts the next `n` statements to observe a busy engine.
    pub fn make_busy(&self, n: u32) {
        self.state.lock().busy_statements = n;
    }

    /// Scripts every statement to observe a busy engine until cleared.
    pub fn make_always_busy(&self, busy: bool) {
        self.state.lock().always_busy = busy;
    }

    /// Scripts the next `n` open requests to fail.
    pub fn fail_next_opens(&self, n: u32) {
        self.state.lock().fail_opens = n;
    }

    /// Scripts statements containing `needle` to fail with a generic error.
    pub fn fail_statements_containing(&self, needle: impl Into<String>) {
        self.state.lock().fail_statements_containing = Some(needle.into());
    }

    /// Scripts the next `n` close calls to fail.
    pub fn fail_next_closes(&self, n: u32) {
        self.state.lock().fail_closes = n;
    }

    /// Scripts key application to fail.
    pub fn fail_keys(&self, fail: bool) {
        self.state.lock().fail_keys = fail;
    }

    /// Removes all scripted failures.
    pub fn clear_script(&self) {
        let mut script = self.state.lock();
        script.busy_statements = 0;
        script.always_busy = false;
        script.fail_opens = 0;
        script.fail_statements_containing = None;
        script.fail_closes = 0;
        script.fail_keys = false;
    }

    /// Returns every statement successfully executed across all handles.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Returns every successful open request in order.
    #[must_use]
    pub fn opens(&self) -> Vec<(String, OpenMode)> {
        self.state.lock().opens.clone()
    }

    /// Returns every passphrase applied across all handles.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().keys.clone()
    }

    /// Returns the number of handles currently open.
    #[must_use]
    pub fn open_handle_count(&self) -> usize {
        self.state.lock().open_handles
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn open(
        &self,
        path: &str,
        mode: OpenMode,
        _vfs: Option<&str>,
    ) -> EngineResult<Box<dyn EngineHandle>> {
        let mut script = self.state.lock();
        if script.fail_opens > 0 {
            script.fail_opens -= 1;
            return Err(EngineError::exec(
                CODE_ERROR,
                format!("scripted open failure for {path}"),
            ));
        }
        script.opens.push((path.to_string(), mode));
        script.open_handles += 1;
        Ok(Box::new(MemoryHandle {
            state: Arc::clone(&self.state),
            mode,
            busy_handler: None,
            encoding: None,
            open: true,
        }))
    }

    fn version(&self) -> EngineVersion {
        self.version
    }

    fn shared_cache_enabled(&self) -> bool {
        self.shared_cache
    }
}

/// A session opened from a [`MemoryEngine`].
pub struct MemoryHandle {
    state: Arc<Mutex<Script>>,
    mode: OpenMode,
    busy_handler: Option<BusyHandler>,
    encoding: Option<String>,
    open: bool,
}

impl MemoryHandle {
    /// Returns the encoding applied to this session, if any.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    // Consumes one busy token, if any. Kept out of the handler loop so
    // the lock is never held while the busy handler runs.
    fn take_busy(&self) -> bool {
        let mut script = self.state.lock();
        if script.always_busy {
            return true;
        }
        if script.busy_statements > 0 {
            script.busy_statements -= 1;
            return true;
        }
        false
    }
}

impl EngineHandle for MemoryHandle {
    fn execute(&mut self, sql: &str) -> EngineResult<()> {
        if !self.open {
            return Err(EngineError::Closed);
        }

        let mut invocations = 0u32;
        while self.take_busy() {
            invocations += 1;
            let retry = match self.busy_handler.as_mut() {
                Some(handler) => handler(invocations),
                None => false,
            };
            if !retry {
                return Err(EngineError::busy("database table is locked"));
            }
        }

        let mut script = self.state.lock();
        if let Some(needle) = script.fail_statements_containing.as_deref() {
            if sql.contains(needle) {
                return Err(EngineError::exec(
                    CODE_ERROR,
                    format!("scripted failure: {sql}"),
                ));
            }
        }
        script.statements.push(sql.to_string());
        Ok(())
    }

    fn set_encoding(&mut self, encoding: &str) -> EngineResult<()> {
        if !self.open {
            return Err(EngineError::Closed);
        }
        self.encoding = Some(encoding.to_string());
        Ok(())
    }

    fn apply_key(&mut self, passphrase: &str) -> EngineResult<()> {
        if !self.open {
            return Err(EngineError::Closed);
        }
        let mut script = self.state.lock();
        if script.fail_keys {
            return Err(EngineError::exec(CODE_ERROR, "scripted key failure"));
        }
        script.keys.push(passphrase.to_string());
        Ok(())
    }

    fn set_busy_handler(&mut self, handler: Option<BusyHandler>) {
        self.busy_handler = handler;
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> EngineResult<()> {
        if !self.open {
            return Ok(());
        }
        let mut script = self.state.lock();
        if script.fail_closes > 0 {
            script.fail_closes -= 1;
            return Err(EngineError::exec(CODE_ERROR, "scripted close failure"));
        }
        script.open_handles -= 1;
        self.open = false;
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if self.open {
            self.state.lock().open_handles -= 1;
            self.open = false;
        }
    }
}

impl std::fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("mode", &self.mode)
            .field("open", &self.open)
            .field("has_busy_handler", &self.busy_handler.is_some())
            .finish()
    }
}
