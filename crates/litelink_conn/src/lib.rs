//! # Litelink Connection Layer
//!
//! Connection management between a client API and an embedded database
//! engine accessed through a native handle.
//!
//! This crate provides:
//! - The connection lifecycle state machine (open / reinitialize / close)
//! - A time-bounded busy-retry policy for contended operations
//! - The transaction controller (commit, rollback, autocommit,
//!   isolation, read-only mode switching)
//! - A wait/notify broadcast shortening busy waits across connections
//!
//! ## Handle Ownership
//!
//! A [`Connection`] owns exactly one engine handle at any instant
//! visible to callers. During a read-only/read-write mode switch a
//! second handle exists transiently; the outgoing handle is released
//! only after the incoming one is fully established, so the connection
//! is never left handle-less.
//!
//! ## Example
//!
//! ```rust
//! use litelink_conn::{Connection, ConnectionConfig};
//! use litelink_engine::MemoryEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let mut conn = Connection::open(engine, "sqlite:/tmp/app.db", ConnectionConfig::new()).unwrap();
//!
//! conn.set_autocommit(false);
//! conn.begin_transaction().unwrap();
//! conn.commit().unwrap();
//! conn.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capability;
mod config;
mod connection;
mod error;
mod handle;
mod manager;
mod retry;
mod state;
mod url;
mod wake;

pub use capability::Capability;
pub use config::{ConnectionConfig, DateMode, DEFAULT_BUSY_TIMEOUT};
pub use connection::{Connection, IsolationLevel};
pub use error::{ConnError, ConnResult};
pub use handle::SessionHandle;
pub use manager::ConnectionManager;
pub use retry::{BusyRetryPolicy, RetryState, RETRY_INTERVAL};
pub use state::TxnState;
pub use wake::WakeBroadcast;
