//! Database error types
//!
//! This module classifies SQLx errors into meaningful storage errors and
//! converts them into the `PortError` the domain ports speak.
//!
//! The append-only triggers installed by the migrations raise a custom
//! SQLSTATE when anything tries to update or delete a protected record.
//! That code is recognized here, so the rejection reaches callers as a
//! distinct immutable-record error rather than a generic query failure.

use thiserror::Error;

use core_kernel::{PortError, RecordKind};

/// SQLSTATE raised by the append-only triggers
///
/// Postgres reserves no five-character class for applications, so the
/// migrations pick an unused code and both sides agree on it.
pub const IMMUTABLE_SQLSTATE: &str = "IMREC";

/// Errors that can occur during database operations
///
/// This enum captures all possible database-related errors, including
/// connection issues, query failures, and constraint violations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Update or delete rejected by an append-only trigger
    #[error("Immutable record in '{table}': {record_id}")]
    ImmutableRecord { table: String, record_id: String },

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// SQL error that fits no more specific category
    #[error("SQL error: {0}")]
    SqlError(#[source] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Arguments
    ///
    /// * `entity` - The type of entity (e.g., "Visit", "Wallet")
    /// * `id` - The identifier that was not found
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Checks if this error rejected a write to an append-only record
    pub fn is_immutable_record(&self) -> bool {
        matches!(self, DatabaseError::ImmutableRecord { .. })
    }
}

/// Maps table names carrying append-only triggers to their record kind
///
/// Returns `None` for tables outside the protected set, such as
/// `insurance_claims`, whose delete guard shares the SQLSTATE but has no
/// kind of its own.
pub fn record_kind_for_table(table: &str) -> Option<RecordKind> {
    match table {
        "charges" => Some(RecordKind::Charge),
        "payments" => Some(RecordKind::Payment),
        "wallet_transactions" => Some(RecordKind::WalletTransaction),
        "audit_log" => Some(RecordKind::AuditEntry),
        _ => None,
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// This analyzes the SQLx error and maps it to the appropriate variant
/// based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                // PostgreSQL error codes
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => {
                            DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                        }
                        "23514" => {
                            DatabaseError::ConstraintViolation(db_err.message().to_string())
                        }
                        IMMUTABLE_SQLSTATE => {
                            let table = db_err.table().unwrap_or_default().to_string();
                            let record_id = db_err
                                .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                                .and_then(|pg| pg.detail())
                                .unwrap_or("unknown")
                                .to_string();
                            DatabaseError::ImmutableRecord { table, record_id }
                        }
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

/// Classifies an owned SQLx error, keeping the source chain when no
/// specific category applies
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match DatabaseError::from(&error) {
            DatabaseError::QueryFailed(_) => DatabaseError::SqlError(error),
            classified => classified,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

/// Lifts storage errors into the error type the domain ports share
///
/// Adapters do their own `NotFound` handling with typed entity names;
/// a `RowNotFound` that reaches this conversion is a bug, and surfaces
/// as an internal error rather than a user-facing one.
impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::ConnectionFailed(m) => PortError::connection(m),
            DatabaseError::PoolExhausted => PortError::connection("connection pool exhausted"),
            DatabaseError::DuplicateEntry(m)
            | DatabaseError::ForeignKeyViolation(m)
            | DatabaseError::ConstraintViolation(m) => PortError::conflict(m),
            DatabaseError::ImmutableRecord { table, record_id } => {
                match record_kind_for_table(&table) {
                    Some(kind) => PortError::immutable_record(kind, record_id),
                    None => PortError::conflict(format!(
                        "records in '{}' cannot be modified or deleted",
                        table
                    )),
                }
            }
            other => PortError::internal(other.to_string()),
        }
    }
}
