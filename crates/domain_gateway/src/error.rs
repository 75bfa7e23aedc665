//! Gateway domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur in the gateway domain
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Amount must be strictly positive
    #[error("Amount must be positive, got {amount}")]
    AmountNotPositive { amount: Decimal },

    /// Validation failed before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// No intent exists under this external reference
    #[error("No payment intent under reference '{reference}'")]
    UnknownReference { reference: String },

    /// An intent already exists under this external reference
    #[error("Payment intent under reference '{reference}' already exists")]
    DuplicateReference { reference: String },

    /// The provider reported a different amount than the intent carries
    #[error("Reference '{reference}' is for {expected}, provider reported {reported}")]
    AmountMismatch {
        reference: String,
        expected: Decimal,
        reported: Decimal,
    },

    /// Invalid intent state transition attempted
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The webhook signature did not match the shared secret
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// The webhook body could not be parsed
    #[error("Malformed webhook envelope: {0}")]
    MalformedEnvelope(String),

    /// Verification could not complete; safe to retry
    #[error("External verification unavailable: {message}")]
    VerificationUnavailable { message: String },

    /// Storage-level failure surfaced by an adapter
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl GatewayError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    /// Returns true when retrying the same delivery is safe and useful
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::VerificationUnavailable { .. })
            || matches!(self, GatewayError::Storage(e) if e.is_transient())
    }

    /// Returns true if the error is a conflict with current state
    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::DuplicateReference { .. })
            || matches!(self, GatewayError::Storage(e) if e.is_conflict())
    }
}
