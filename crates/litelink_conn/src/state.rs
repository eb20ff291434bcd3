//! Transaction flag state.

use crate::error::{ConnError, ConnResult};

/// Autocommit and in-transaction flags for one connection.
///
/// Both flags are touched by transaction calls and by the external
/// statement layer, so all mutation goes through these narrow methods.
/// The invariant `in_transaction ⇒ ¬autocommit` is enforced here and
/// nowhere else.
#[derive(Debug, Clone, Copy)]
pub struct TxnState {
    autocommit: bool,
    in_transaction: bool,
}

impl TxnState {
    /// Creates the initial state: autocommit on, no open transaction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            autocommit: true,
            in_transaction: false,
        }
    }

    /// Returns true while autocommit mode is on.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Returns true while an explicit transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Marks an explicit transaction as open.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while autocommit is on; an
    /// explicit transaction can only exist with autocommit off.
    pub fn enter_transaction(&mut self) -> ConnResult<()> {
        if self.autocommit {
            return Err(ConnError::invalid_state(
                "cannot open a transaction while autocommit is on",
            ));
        }
        self.in_transaction = true;
        Ok(())
    }

    /// Marks any open transaction as finished.
    pub fn leave_transaction(&mut self) {
        self.in_transaction = false;
    }

    /// Updates the autocommit flag.
    ///
    /// Enabling autocommit clears the in-transaction flag
    /// unconditionally; the caller is responsible for having rolled
    /// back (or chosen to abandon) any open transaction first.
    pub fn set_autocommit(&mut self, value: bool) {
        if value {
            self.in_transaction = false;
        }
        self.autocommit = value;
    }
}

impl Default for TxnState {
    fn default() -> Self {
        Self::new()
    }
}
