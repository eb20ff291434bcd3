//! # Litelink Engine
//!
//! Engine handle contract for litelink.
//!
//! This crate defines the seam between the connection-management layer
//! and the embedded database engine it drives. Engines are **opaque
//! session factories** - the connection layer owns lifecycle, retry,
//! and transaction policy, while the engine owns statement execution.
//!
//! ## Design Principles
//!
//! - A handle is an exclusively-owned session against the engine
//! - Busy conditions are reported as errors, optionally softened by an
//!   installed busy handler
//! - Handles must be `Send` so connections can move across threads
//! - The connection layer owns all retry and transaction policy
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - A scriptable in-memory engine for testing
//!
//! Production engines are supplied by downstream crates that bind the
//! real native library behind [`Engine`] and [`EngineHandle`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handle;
mod memory;
mod version;

pub use error::{EngineError, EngineResult, CODE_BUSY, CODE_ERROR, CODE_MISUSE};
pub use handle::{BusyHandler, Engine, EngineHandle, OpenMode};
pub use memory::{MemoryEngine, MemoryHandle};
pub use version::EngineVersion;
