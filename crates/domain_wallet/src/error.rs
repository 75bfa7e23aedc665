//! Wallet domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur in the wallet domain
#[derive(Debug, Error)]
pub enum WalletError {
    /// Amount must be strictly positive
    #[error("Amount must be positive, got {amount}")]
    AmountNotPositive { amount: Decimal },

    /// Debit rejected because the wallet cannot fund it
    #[error("Insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    /// Validation failed before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// A replayed transaction history disagrees with its stored balances
    #[error("Ledger integrity error: {0}")]
    LedgerIntegrity(String),

    /// Financial calculation error
    #[error("Financial error: {0}")]
    Financial(String),

    /// Storage-level failure surfaced by an adapter
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl WalletError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        WalletError::Validation(message.into())
    }

    /// Returns true if the error is a conflict with current wallet state
    pub fn is_conflict(&self) -> bool {
        matches!(self, WalletError::InsufficientBalance { .. })
            || matches!(self, WalletError::Storage(e) if e.is_conflict())
    }
}
