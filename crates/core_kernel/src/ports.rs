//! Ports and adapters infrastructure
//!
//! Each domain defines port traits for its storage needs; adapters in
//! `infra_db` implement them against PostgreSQL or in-memory state. This
//! module provides the error type shared by all port implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Record kinds protected by append-only storage rules
///
/// Update or delete against any of these record kinds must fail at the
/// storage-access layer, so no code path, administrative tooling included,
/// can rewrite financial history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Charge,
    Payment,
    WalletTransaction,
    AuditEntry,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Charge => "charge",
            RecordKind::Payment => "payment",
            RecordKind::WalletTransaction => "wallet_transaction",
            RecordKind::AuditEntry => "audit_entry",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for port operations
///
/// Provides a unified error type that all port implementations must use,
/// ensuring consistent error handling across adapters.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The operation conflicts with existing data
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Update or delete was attempted on an append-only record
    #[error("Immutable record: {record_kind} {id} cannot be modified or deleted")]
    ImmutableRecord { record_kind: RecordKind, id: String },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Validation error with field information
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates an ImmutableRecord error
    pub fn immutable_record(record_kind: RecordKind, id: impl fmt::Display) -> Self {
        PortError::ImmutableRecord {
            record_kind,
            id: id.to_string(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        PortError::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. } | PortError::Timeout { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if this error is a conflict with current state
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }

    /// Returns true if this error rejected a write to an append-only record
    pub fn is_immutable_record(&self) -> bool {
        matches!(self, PortError::ImmutableRecord { .. })
    }
}

/// Marker trait for all domain ports
///
/// All port traits should extend this marker to ensure they are
/// thread-safe and can be used in async contexts.
pub trait DomainPort: Send + Sync + 'static {}
