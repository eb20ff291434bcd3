//! Error types for engine operations.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Native code reported when a requested resource is locked by another session.
pub const CODE_BUSY: i32 = 5;

/// Native code for a generic statement failure.
pub const CODE_ERROR: i32 = 1;

/// Native code for using a handle outside its legal lifecycle.
pub const CODE_MISUSE: i32 = 21;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required resource is locked by another session.
    ///
    /// Callers may retry; the connection layer bounds retries with its
    /// busy policy.
    #[error("resource busy (code {code}): {message}")]
    Busy {
        /// Native error code.
        code: i32,
        /// Engine-supplied message.
        message: String,
    },

    /// A statement failed for a non-busy reason.
    #[error("engine error (code {code}): {message}")]
    Exec {
        /// Native error code.
        code: i32,
        /// Engine-supplied message.
        message: String,
    },

    /// The handle has already been closed.
    #[error("handle is closed")]
    Closed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Creates a busy error with the standard busy code.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            code: CODE_BUSY,
            message: message.into(),
        }
    }

    /// Creates a statement failure with an explicit native code.
    pub fn exec(code: i32, message: impl Into<String>) -> Self {
        Self::Exec {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this error reports a busy condition.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Returns the native error code carried by this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Busy { code, .. } | Self::Exec { code, .. } => *code,
            Self::Closed => CODE_MISUSE,
            Self::Io(_) => CODE_ERROR,
        }
    }
}
