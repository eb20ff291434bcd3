//! Connection lifecycle and transaction control.

use crate::capability::Capability;
use crate::config::{ConnectionConfig, DateMode};
use crate::error::{ConnError, ConnResult};
use crate::handle::SessionHandle;
use crate::manager::ConnectionManager;
use crate::retry::RETRY_INTERVAL;
use crate::state::TxnState;
use crate::url;
use crate::wake::WakeBroadcast;
use litelink_engine::{Engine, OpenMode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Transaction isolation levels callers can request.
///
/// Only [`ReadUncommitted`](Self::ReadUncommitted) and
/// [`Serializable`](Self::Serializable) are meaningful to the engine;
/// the intermediate levels exist so that requesting them can be
/// rejected rather than silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Reads may observe uncommitted changes from other sessions
    /// (requires engine shared-cache mode).
    ReadUncommitted,
    /// Reads see only committed data.
    ReadCommitted,
    /// Repeated reads within a transaction are stable.
    RepeatableRead,
    /// Full serializable isolation (the engine default).
    Serializable,
}

/// One logical connection to the embedded engine.
///
/// A connection owns exactly one engine handle at any instant visible
/// to callers and tracks the transaction flags governing it. Public
/// operations are expected to be invoked under external mutual
/// exclusion; the connection does not serialize calls internally.
///
/// # Lifecycle
///
/// `Closed → Open(Autocommit)` on [`open`](Self::open).
/// `Open(Autocommit) ↔ Open(InTransaction)` via the statement layer's
/// [`begin_transaction`](Self::begin_transaction) and
/// [`commit`](Self::commit)/[`rollback`](Self::rollback).
/// `Open(*) → Closed` on [`close`](Self::close), which forces a
/// best-effort rollback first. Read-only mode is an orthogonal
/// sub-state of `Open`; switching is legal only outside a transaction.
pub struct Connection {
    manager: ConnectionManager,
    handle: Option<SessionHandle>,
    state: TxnState,
    readonly: bool,
    isolation: IsolationLevel,
    timeout: Duration,
    date_mode: DateMode,
    path: String,
    wake: Arc<WakeBroadcast>,
}

impl Connection {
    /// Opens a connection to the database named by `url`.
    ///
    /// The URL must match one of the two accepted prefixes
    /// (`sqlite:/`, `jdbc:sqlite:/`); anything else fails before any
    /// engine call. On success the session has been initialized, the
    /// optional passphrase applied, and a busy handler registered on
    /// the handle. Any failure during construction closes the handle
    /// (if one was opened) before the error propagates.
    ///
    /// # Errors
    ///
    /// - [`ConnError::UnsupportedUrl`] for an unrecognized URL form
    /// - [`ConnError::BusyTimeout`] if session initialization stayed
    ///   busy past the configured timeout
    /// - [`ConnError::KeySetup`] if applying the passphrase failed
    /// - [`ConnError::Engine`] for any other engine failure
    pub fn open(
        engine: Arc<dyn Engine>,
        url: &str,
        config: ConnectionConfig,
    ) -> ConnResult<Self> {
        let path = url::resolve_path(url)?.to_string();

        let wake = config
            .wake
            .unwrap_or_else(|| Arc::new(WakeBroadcast::new()));
        let manager = ConnectionManager::new(
            engine,
            config.encoding,
            config.vfs,
            config.timeout,
            Arc::clone(&wake),
        );

        let mut handle = manager.open(&path, OpenMode::ReadWriteCreate)?;

        if let Some(passphrase) = config.passphrase.as_deref().filter(|p| !p.is_empty()) {
            if let Err(e) = handle.apply_key(passphrase) {
                let _ = handle.close();
                return Err(ConnError::key_setup(e.to_string()));
            }
        }

        install_busy_handler(&mut handle, config.timeout, Arc::clone(&wake));

        Ok(Self {
            manager,
            handle: Some(handle),
            state: TxnState::new(),
            readonly: false,
            isolation: IsolationLevel::Serializable,
            timeout: config.timeout,
            date_mode: config.date_mode,
            path,
            wake,
        })
    }

    /// Commits the open transaction.
    ///
    /// Succeeds without any engine call when no transaction is open.
    /// The in-transaction flag is cleared only if the COMMIT statement
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error on a closed connection, or the
    /// engine's error if the COMMIT fails (leaving the flag set).
    pub fn commit(&mut self) -> ConnResult<()> {
        self.finish_transaction("COMMIT")
    }

    /// Rolls back the open transaction.
    ///
    /// Symmetric to [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error on a closed connection, or the
    /// engine's error if the ROLLBACK fails (leaving the flag set).
    pub fn rollback(&mut self) -> ConnResult<()> {
        self.finish_transaction("ROLLBACK")
    }

    fn finish_transaction(&mut self, sql: &str) -> ConnResult<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ConnError::invalid_state("stale connection"))?;
        if !self.state.in_transaction() {
            return Ok(());
        }
        handle.execute(sql)?;
        self.state.leave_transaction();
        Ok(())
    }

    /// Updates the autocommit flag.
    ///
    /// Enabling autocommit while a transaction is open forces a
    /// rollback first; a failure of that rollback is discarded so the
    /// flags always end up consistent (`autocommit` on, transaction
    /// flag cleared). Disabling autocommit takes effect immediately;
    /// the statement layer opens the next transaction.
    pub fn set_autocommit(&mut self, value: bool) {
        if value && self.state.in_transaction() {
            if let Some(handle) = self.handle.as_mut() {
                if let Err(e) = handle.execute("ROLLBACK") {
                    warn!(error = %e, "rollback forced by autocommit toggle failed");
                }
            }
        }
        self.state.set_autocommit(value);
    }

    /// Switches the connection between read-only and read-write mode.
    ///
    /// Switching opens a brand-new handle in the requested mode first;
    /// only after that succeeds is the old handle closed and the new
    /// one adopted. If opening the new handle fails, the old handle
    /// remains authoritative. If the old handle fails to close, the new
    /// handle is closed during cleanup and the connection state is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while a transaction is open or on
    /// a closed connection.
    pub fn set_read_only(&mut self, readonly: bool) -> ConnResult<()> {
        if self.state.in_transaction() {
            return Err(ConnError::invalid_state("incomplete transaction"));
        }
        if self.handle.is_none() {
            return Err(ConnError::invalid_state("stale connection"));
        }
        if readonly == self.readonly {
            return Ok(());
        }

        let mode = if readonly {
            OpenMode::ReadOnly
        } else {
            OpenMode::ReadWriteCreate
        };
        let mut incoming = self.manager.open(&self.path, mode)?;

        if let Some(outgoing) = self.handle.as_mut() {
            if let Err(e) = outgoing.close() {
                let _ = incoming.close();
                return Err(e.into());
            }
        }

        install_busy_handler(&mut incoming, self.timeout, Arc::clone(&self.wake));
        self.handle = Some(incoming);
        self.readonly = readonly;
        debug!(readonly, "connection mode switched");
        Ok(())
    }

    /// Changes the transaction isolation level.
    ///
    /// Requesting the level already in effect always succeeds as a
    /// no-op. An actual change is only possible between
    /// [`IsolationLevel::ReadUncommitted`] and
    /// [`IsolationLevel::Serializable`], and only when the engine runs
    /// with shared-cache mode; every other request fails with a
    /// not-supported error.
    ///
    /// # Errors
    ///
    /// Returns [`ConnError::Unsupported`] when the requested level
    /// cannot be put into effect.
    pub fn set_transaction_isolation(&mut self, level: IsolationLevel) -> ConnResult<()> {
        if self.manager.shared_cache_enabled() {
            let flag = match level {
                IsolationLevel::ReadUncommitted
                    if self.isolation != IsolationLevel::ReadUncommitted =>
                {
                    Some("on")
                }
                IsolationLevel::Serializable
                    if self.isolation != IsolationLevel::Serializable =>
                {
                    Some("off")
                }
                _ => None,
            };
            if let (Some(flag), Some(handle)) = (flag, self.handle.as_mut()) {
                match handle.execute(&format!("PRAGMA read_uncommitted = {flag};")) {
                    Ok(()) => self.isolation = level,
                    Err(e) => debug!(error = %e, "isolation pragma failed"),
                }
            }
        }
        if level != self.isolation {
            return Err(ConnError::unsupported(Capability::IsolationChange));
        }
        Ok(())
    }

    /// Marks an explicit transaction as open.
    ///
    /// Called by the statement layer when it issues a BEGIN-equivalent
    /// under autocommit-off mode. This is the single choke point for
    /// the `in_transaction ⇒ ¬autocommit` invariant.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error on a closed connection or while
    /// autocommit is on.
    pub fn begin_transaction(&mut self) -> ConnResult<()> {
        if self.handle.is_none() {
            return Err(ConnError::invalid_state("stale connection"));
        }
        self.state.enter_transaction()
    }

    /// Clears the in-transaction flag.
    ///
    /// Called by the statement layer when an implicit transaction ends
    /// outside of [`commit`](Self::commit)/[`rollback`](Self::rollback).
    pub fn end_transaction(&mut self) {
        self.state.leave_transaction();
    }

    /// Closes the connection.
    ///
    /// Any pending transaction is rolled back best-effort (a rollback
    /// failure is swallowed), then the handle is released. Closing an
    /// already-closed connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if releasing the handle fails; the
    /// handle is retained in that case so close can be retried.
    pub fn close(&mut self) -> ConnResult<()> {
        if let Err(e) = self.rollback() {
            debug!(error = %e, "rollback during close failed");
        }
        self.state.leave_transaction();

        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                self.handle = Some(handle);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Returns true once the connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Returns true while the connection is in read-only mode.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.readonly
    }

    /// Returns the autocommit flag.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.state.autocommit()
    }

    /// Returns true while an explicit transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.state.in_transaction()
    }

    /// Returns the transaction isolation level in effect.
    #[must_use]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Returns the session date representation.
    #[must_use]
    pub fn date_mode(&self) -> DateMode {
        self.date_mode
    }

    /// Returns the resolved database path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the busy-retry time budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the session handle for statement and metadata layers.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error on a closed connection.
    pub fn handle_mut(&mut self) -> ConnResult<&mut SessionHandle> {
        self.handle
            .as_mut()
            .ok_or_else(|| ConnError::invalid_state("stale connection"))
    }

    /// Returns true if the connection implements `capability`.
    ///
    /// Every listed capability is unimplemented by design; this probe
    /// exists so callers can branch instead of trapping the error.
    #[must_use]
    pub fn supports(&self, _capability: Capability) -> bool {
        false
    }

    /// Fails with a not-supported error for `capability`.
    ///
    /// No engine call is attempted.
    ///
    /// # Errors
    ///
    /// Always returns [`ConnError::Unsupported`].
    pub fn require(&self, capability: Capability) -> ConnResult<()> {
        Err(ConnError::unsupported(capability))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("readonly", &self.readonly)
            .field("autocommit", &self.state.autocommit())
            .field("in_transaction", &self.state.in_transaction())
            .field("isolation", &self.isolation)
            .finish_non_exhaustive()
    }
}

/// Registers the connection's busy callback on a handle.
///
/// The callback applies the blocking retry policy inline: baseline
/// reset while the engine reports the first contention, rejection once
/// the time budget is exhausted, and a wake-bounded park between
/// retries.
fn install_busy_handler(handle: &mut SessionHandle, timeout: Duration, wake: Arc<WakeBroadcast>) {
    let mut baseline = Instant::now();
    handle.set_busy_handler(Some(Box::new(move |count| {
        if count <= 1 {
            baseline = Instant::now();
        }
        if baseline.elapsed() > timeout {
            return false;
        }
        wake.wait_for(RETRY_INTERVAL);
        true
    })));
}

#[cfg(test)]
mod tests {
    use super::*;
    use litelink_engine::MemoryEngine;

    fn open(engine: &MemoryEngine) -> Connection {
        open_with(engine, ConnectionConfig::new())
    }

    fn open_with(engine: &MemoryEngine, config: ConnectionConfig) -> Connection {
        Connection::open(Arc::new(engine.clone()), "sqlite:/tmp/test.db", config).unwrap()
    }

    fn enter_transaction(conn: &mut Connection) {
        conn.set_autocommit(false);
        conn.begin_transaction().unwrap();
    }

    // Statements the engine saw, minus the session-init pragmas
    fn statements_after_init(engine: &MemoryEngine) -> Vec<String> {
        const INIT: [&str; 4] = [
            "PRAGMA short_column_names = off;",
            "PRAGMA full_column_names = on;",
            "PRAGMA empty_result_callbacks = on;",
            "PRAGMA show_datatypes = on;",
        ];
        engine
            .statements()
            .into_iter()
            .filter(|sql| !INIT.contains(&sql.as_str()))
            .collect()
    }

    #[test]
    fn open_resolves_url_and_initializes() {
        let engine = MemoryEngine::new();
        let conn = open(&engine);

        assert_eq!(conn.path(), "/tmp/test.db");
        assert!(!conn.is_closed());
        assert!(conn.autocommit());
        assert!(!conn.in_transaction());
        assert!(!conn.is_read_only());
        assert_eq!(conn.isolation(), IsolationLevel::Serializable);
        assert_eq!(
            engine.opens(),
            vec![("/tmp/test.db".to_string(), OpenMode::ReadWriteCreate)]
        );
    }

    #[test]
    fn open_rejects_unknown_url_before_engine_call() {
        let engine = MemoryEngine::new();
        let err = Connection::open(
            Arc::new(engine.clone()),
            "foo://bar",
            ConnectionConfig::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ConnError::UnsupportedUrl { .. }));
        assert!(engine.opens().is_empty());
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn open_applies_passphrase() {
        let engine = MemoryEngine::new();
        let _conn = open_with(&engine, ConnectionConfig::new().passphrase("secret"));
        assert_eq!(engine.keys(), vec!["secret"]);
    }

    #[test]
    fn empty_passphrase_applies_no_key() {
        let engine = MemoryEngine::new();
        let _conn = open_with(&engine, ConnectionConfig::new().passphrase(""));
        assert!(engine.keys().is_empty());
    }

    #[test]
    fn key_failure_closes_handle() {
        let engine = MemoryEngine::new();
        engine.fail_keys(true);

        let err = Connection::open(
            Arc::new(engine.clone()),
            "sqlite:/tmp/test.db",
            ConnectionConfig::new().passphrase("secret"),
        )
        .unwrap_err();

        assert!(matches!(err, ConnError::KeySetup { .. }));
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn commit_outside_transaction_is_noop() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert!(statements_after_init(&engine).is_empty());
    }

    #[test]
    fn commit_clears_flag_on_success() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        conn.commit().unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(statements_after_init(&engine), vec!["COMMIT"]);
    }

    #[test]
    fn failed_commit_leaves_flag_set() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        engine.fail_statements_containing("COMMIT");
        assert!(conn.commit().is_err());
        assert!(conn.in_transaction());

        // Flag still set, so a later rollback issues the statement
        engine.clear_script();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());
    }

    #[test]
    fn rollback_clears_flag_on_success() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        conn.rollback().unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(statements_after_init(&engine), vec!["ROLLBACK"]);
    }

    #[test]
    fn commit_on_closed_connection_fails() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        conn.close().unwrap();

        assert!(matches!(
            conn.commit(),
            Err(ConnError::InvalidState { .. })
        ));
    }

    #[test]
    fn autocommit_toggle_forces_rollback() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        conn.set_autocommit(true);
        assert!(conn.autocommit());
        assert!(!conn.in_transaction());
        assert_eq!(statements_after_init(&engine), vec!["ROLLBACK"]);
    }

    #[test]
    fn autocommit_toggle_swallows_rollback_failure() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        engine.fail_statements_containing("ROLLBACK");
        conn.set_autocommit(true);

        assert!(conn.autocommit());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn begin_transaction_requires_autocommit_off() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        assert!(matches!(
            conn.begin_transaction(),
            Err(ConnError::InvalidState { .. })
        ));
        assert!(!conn.in_transaction());
    }

    #[test]
    fn set_read_only_rejected_inside_transaction() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        let err = conn.set_read_only(true).unwrap_err();
        assert!(matches!(err, ConnError::InvalidState { .. }));
        assert!(!conn.is_read_only());
        assert_eq!(engine.open_handle_count(), 1);
    }

    #[test]
    fn set_read_only_same_mode_is_noop() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        conn.set_read_only(false).unwrap();
        assert_eq!(engine.opens().len(), 1);
    }

    #[test]
    fn set_read_only_swaps_handles() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        conn.set_read_only(true).unwrap();
        assert!(conn.is_read_only());
        assert_eq!(engine.open_handle_count(), 1);
        assert_eq!(
            engine.opens(),
            vec![
                ("/tmp/test.db".to_string(), OpenMode::ReadWriteCreate),
                ("/tmp/test.db".to_string(), OpenMode::ReadOnly),
            ]
        );
        assert_eq!(conn.handle_mut().unwrap().mode(), OpenMode::ReadOnly);

        conn.set_read_only(false).unwrap();
        assert!(!conn.is_read_only());
        assert_eq!(engine.open_handle_count(), 1);
    }

    #[test]
    fn failed_mode_switch_keeps_old_handle() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        engine.fail_next_opens(1);
        assert!(conn.set_read_only(true).is_err());

        assert!(!conn.is_read_only());
        assert!(!conn.is_closed());
        assert_eq!(engine.open_handle_count(), 1);

        // Old handle remains usable
        conn.handle_mut()
            .unwrap()
            .execute("SELECT 1")
            .unwrap();
    }

    #[test]
    fn old_close_failure_cleans_up_new_handle() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        // New-mode open succeeds, closing the outgoing handle fails
        engine.fail_next_closes(1);
        assert!(conn.set_read_only(true).is_err());

        assert!(!conn.is_read_only());
        assert!(!conn.is_closed());
        // Outgoing handle retained, incoming handle released
        assert_eq!(engine.open_handle_count(), 1);
        assert_eq!(conn.handle_mut().unwrap().mode(), OpenMode::ReadWriteCreate);
    }

    #[test]
    fn isolation_same_level_is_noop_without_shared_cache() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        conn.set_transaction_isolation(IsolationLevel::Serializable)
            .unwrap();
        assert!(statements_after_init(&engine).is_empty());
    }

    #[test]
    fn isolation_change_without_shared_cache_is_unsupported() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        let err = conn
            .set_transaction_isolation(IsolationLevel::ReadUncommitted)
            .unwrap_err();
        assert!(matches!(err, ConnError::Unsupported { .. }));
        assert_eq!(conn.isolation(), IsolationLevel::Serializable);
    }

    #[test]
    fn isolation_change_with_shared_cache_issues_pragma() {
        let engine = MemoryEngine::new().with_shared_cache(true);
        let mut conn = open(&engine);

        conn.set_transaction_isolation(IsolationLevel::ReadUncommitted)
            .unwrap();
        assert_eq!(conn.isolation(), IsolationLevel::ReadUncommitted);

        conn.set_transaction_isolation(IsolationLevel::Serializable)
            .unwrap();
        assert_eq!(conn.isolation(), IsolationLevel::Serializable);

        assert_eq!(
            statements_after_init(&engine),
            vec![
                "PRAGMA read_uncommitted = on;".to_string(),
                "PRAGMA read_uncommitted = off;".to_string(),
            ]
        );
    }

    #[test]
    fn intermediate_isolation_levels_always_unsupported() {
        let engine = MemoryEngine::new().with_shared_cache(true);
        let mut conn = open(&engine);

        for level in [IsolationLevel::ReadCommitted, IsolationLevel::RepeatableRead] {
            let err = conn.set_transaction_isolation(level).unwrap_err();
            assert!(matches!(err, ConnError::Unsupported { .. }));
        }
        assert_eq!(conn.isolation(), IsolationLevel::Serializable);
    }

    #[test]
    fn isolation_pragma_failure_is_swallowed_then_unsupported() {
        let engine = MemoryEngine::new().with_shared_cache(true);
        let mut conn = open(&engine);

        engine.fail_statements_containing("read_uncommitted");
        let err = conn
            .set_transaction_isolation(IsolationLevel::ReadUncommitted)
            .unwrap_err();
        assert!(matches!(err, ConnError::Unsupported { .. }));
        assert_eq!(conn.isolation(), IsolationLevel::Serializable);
    }

    #[test]
    fn close_rolls_back_pending_transaction() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        conn.close().unwrap();
        assert!(conn.is_closed());
        assert!(!conn.in_transaction());
        assert_eq!(statements_after_init(&engine), vec!["ROLLBACK"]);
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn close_swallows_rollback_failure() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);
        enter_transaction(&mut conn);

        engine.fail_statements_containing("ROLLBACK");
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        conn.close().unwrap();
        conn.close().unwrap();
        assert!(conn.is_closed());
    }

    #[test]
    fn close_reports_handle_release_failure_and_can_retry() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        engine.fail_next_closes(1);
        assert!(conn.close().is_err());
        assert!(!conn.is_closed());

        conn.close().unwrap();
        assert!(conn.is_closed());
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn capability_surface_is_all_unsupported() {
        let engine = MemoryEngine::new();
        let conn = open(&engine);

        let caps = [
            Capability::Savepoints,
            Capability::CallableStatements,
            Capability::TypeMaps,
            Capability::GeneratedKeys,
            Capability::CursorHoldability,
            Capability::NativeSqlRewriting,
        ];
        for cap in caps {
            assert!(!conn.supports(cap));
            assert!(matches!(
                conn.require(cap),
                Err(ConnError::Unsupported { capability }) if capability == cap
            ));
        }
        // No engine traffic from probing
        assert!(statements_after_init(&engine).is_empty());
    }

    #[test]
    fn date_mode_captured_from_config() {
        let engine = MemoryEngine::new();
        let conn = open_with(&engine, ConnectionConfig::new().date_selector("julian"));
        assert_eq!(conn.date_mode(), DateMode::Julian);
    }

    #[test]
    fn busy_statement_retries_via_registered_handler() {
        let engine = MemoryEngine::new();
        let mut conn = open(&engine);

        // Two contended polls, then the engine yields
        engine.make_busy(2);
        conn.handle_mut()
            .unwrap()
            .execute("INSERT INTO t VALUES (1)")
            .unwrap();
        assert_eq!(
            statements_after_init(&engine),
            vec!["INSERT INTO t VALUES (1)"]
        );
    }

    #[test]
    fn busy_statement_times_out_through_handler() {
        let engine = MemoryEngine::new();
        let mut conn = open_with(
            &engine,
            ConnectionConfig::new().timeout(Duration::from_millis(150)),
        );

        engine.make_always_busy(true);
        let start = Instant::now();
        let err = conn
            .handle_mut()
            .unwrap()
            .execute("INSERT INTO t VALUES (1)")
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_busy());
        assert!(elapsed >= Duration::from_millis(150), "gave up too early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "gave up too late: {elapsed:?}");
    }

    #[test]
    fn shared_wake_broadcast_crosses_connections() {
        let engine = MemoryEngine::new();
        let wake = Arc::new(WakeBroadcast::new());

        let mut writer = open_with(
            &engine,
            ConnectionConfig::new().wake_broadcast(Arc::clone(&wake)),
        );

        let waiter_wake = Arc::clone(&wake);
        let waiter = std::thread::spawn(move || {
            let start = Instant::now();
            waiter_wake.wait_for(Duration::from_secs(5));
            start.elapsed()
        });

        // Keep completing statements on the writer so the waiting
        // thread cannot miss the broadcast
        for _ in 0..20 {
            std::thread::sleep(Duration::from_millis(10));
            writer
                .handle_mut()
                .unwrap()
                .execute("INSERT INTO t VALUES (1)")
                .unwrap();
        }

        let elapsed = waiter.join().unwrap();
        assert!(
            elapsed < Duration::from_secs(2),
            "waiter should have been woken by the writer, took {elapsed:?}"
        );
    }

    #[test]
    fn open_honors_busy_timeout_bounds() {
        let engine = MemoryEngine::new();
        engine.make_always_busy(true);
        let timeout = Duration::from_millis(250);

        let start = Instant::now();
        let err = Connection::open(
            Arc::new(engine.clone()),
            "sqlite:/tmp/test.db",
            ConnectionConfig::new().timeout(timeout),
        )
        .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ConnError::BusyTimeout { .. }));
        assert!(elapsed >= timeout, "failed too early: {elapsed:?}");
        assert!(
            elapsed < timeout + Duration::from_millis(400),
            "failed too late: {elapsed:?}"
        );
        assert_eq!(engine.open_handle_count(), 0);
    }
}
