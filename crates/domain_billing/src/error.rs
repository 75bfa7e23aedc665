//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{ChargeId, PortError, VisitId, WalletId};

use crate::payment::PaymentMethod;
use crate::visit::PaymentStatus;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Amount must be strictly positive
    #[error("Amount must be positive, got {amount}")]
    AmountNotPositive { amount: Decimal },

    /// Validation failed before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// The visit is closed and accepts no further mutation
    #[error("Visit {visit_id} is closed")]
    VisitClosed { visit_id: VisitId },

    /// Closure was rejected because money is still owed
    #[error("Visit {visit_id} has an outstanding balance of {outstanding}")]
    OutstandingBalance {
        visit_id: VisitId,
        outstanding: Decimal,
        stored_status: PaymentStatus,
    },

    /// Invalid state transition attempted
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A charge can be reversed at most once
    #[error("Charge {charge_id} has already been reversed")]
    ChargeAlreadyReversed { charge_id: ChargeId },

    /// Each visit carries at most one insurance record
    #[error("Visit {visit_id} already has an insurance record")]
    InsuranceAlreadyAttached { visit_id: VisitId },

    /// Approval requested for a visit with no insurance record
    #[error("Visit {visit_id} has no insurance record")]
    NoInsurance { visit_id: VisitId },

    /// Gateway payments require a verified external reference
    #[error("Gateway payments require a verified external reference")]
    MissingExternalReference,

    /// Wallet and insurance settlements flow through their own ledgers
    #[error("Payment method {method} is not accepted as a direct entry")]
    MethodRequiresDedicatedFlow { method: PaymentMethod },

    /// A ledger record referencing another visit was passed in
    #[error("Record belongs to visit {found}, expected {expected}")]
    ForeignRecord { expected: VisitId, found: VisitId },

    /// Wallet settlement rejected because the wallet cannot fund it
    #[error("Wallet {wallet_id} holds {available}, cannot debit {requested}")]
    InsufficientWalletBalance {
        wallet_id: WalletId,
        available: Decimal,
        requested: Decimal,
    },

    /// Financial calculation error
    #[error("Financial error: {0}")]
    Financial(String),

    /// Storage-level failure surfaced by an adapter
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl BillingError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    /// Returns true if the error is a conflict with current visit state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::VisitClosed { .. }
                | BillingError::OutstandingBalance { .. }
                | BillingError::ChargeAlreadyReversed { .. }
                | BillingError::InsuranceAlreadyAttached { .. }
                | BillingError::InsufficientWalletBalance { .. }
        ) || matches!(self, BillingError::Storage(e) if e.is_conflict())
    }
}
