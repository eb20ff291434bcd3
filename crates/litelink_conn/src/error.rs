//! Error types for connection operations.

use crate::capability::Capability;
use litelink_engine::EngineError;
use thiserror::Error;

/// Result type for connection operations.
pub type ConnResult<T> = Result<T, ConnError>;

/// Errors that can occur in connection operations.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The connection URL matched neither accepted prefix.
    #[error("unsupported url: {url}")]
    UnsupportedUrl {
        /// The rejected URL.
        url: String,
    },

    /// The requested feature is never implemented by this layer.
    #[error("not supported: {capability}")]
    Unsupported {
        /// The feature that was requested.
        capability: Capability,
    },

    /// The operation is illegal in the connection's current state.
    #[error("invalid connection state: {message}")]
    InvalidState {
        /// Description of the violation.
        message: String,
    },

    /// The busy-retry loop exceeded its time budget.
    #[error("busy timeout exceeded (engine code {code})")]
    BusyTimeout {
        /// Last native error code observed before giving up.
        code: i32,
    },

    /// Applying the encryption passphrase failed.
    #[error("error while setting key: {message}")]
    KeySetup {
        /// Engine-supplied failure description.
        message: String,
    },

    /// Any other failure reported by the engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl ConnError {
    /// Creates an unsupported-URL error.
    pub fn unsupported_url(url: impl Into<String>) -> Self {
        Self::UnsupportedUrl { url: url.into() }
    }

    /// Creates a not-supported error for a capability.
    #[must_use]
    pub fn unsupported(capability: Capability) -> Self {
        Self::Unsupported { capability }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a key-setup error.
    pub fn key_setup(message: impl Into<String>) -> Self {
        Self::KeySetup {
            message: message.into(),
        }
    }
}
