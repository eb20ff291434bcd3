//! Capability surface for never-implemented features.

use std::fmt;

/// Features a caller can probe for before attempting them.
///
/// The supported subset of the public API (open, close, commit,
/// rollback, mode switching, isolation) is the only real state machine;
/// everything listed here fails immediately with a tagged not-supported
/// outcome and no engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Named or unnamed savepoints within a transaction.
    Savepoints,
    /// Stored-procedure style callable statements.
    CallableStatements,
    /// Custom type maps for result coercion.
    TypeMaps,
    /// Generated-key retrieval strategies other than "none".
    GeneratedKeys,
    /// Result-set holdability other than the default.
    CursorHoldability,
    /// Engine-side rewriting of vendor-neutral SQL.
    NativeSqlRewriting,
    /// Changing the transaction isolation level.
    IsolationChange,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Savepoints => "savepoints",
            Self::CallableStatements => "callable statements",
            Self::TypeMaps => "custom type maps",
            Self::GeneratedKeys => "generated-key retrieval",
            Self::CursorHoldability => "non-default cursor holdability",
            Self::NativeSqlRewriting => "native SQL rewriting",
            Self::IsolationChange => "changing the transaction isolation level",
        };
        f.write_str(name)
    }
}
