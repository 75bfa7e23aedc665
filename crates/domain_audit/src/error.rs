//! Audit domain errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur in the audit domain
#[derive(Debug, Error)]
pub enum AuditError {
    /// Validation failed before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage-level failure surfaced by an adapter
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl AuditError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        AuditError::Validation(message.into())
    }
}
