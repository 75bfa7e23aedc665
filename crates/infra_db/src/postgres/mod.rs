//! PostgreSQL port implementations
//!
//! One adapter per domain port, all sharing the same transaction
//! discipline: the visit row is locked `FOR UPDATE` first, domain
//! validation runs against the locked state, the append happens, the
//! ledger view is re-read inside the transaction, the clearing pass
//! runs, and the visit update, event rows and audit entry commit
//! together. Locks are always taken in the same order (visit before
//! wallet, intent before visit) so concurrent writers cannot deadlock.

mod audit;
mod gateway;
mod ledger;
mod rows;
mod wallet;

pub use audit::PgAuditSink;
pub use gateway::PgGatewayStore;
pub use ledger::PgLedgerStore;
pub use wallet::PgWalletStore;

use core_kernel::PortError;

use crate::error::DatabaseError;

/// Classifies a raw SQLx error into the shared port error
pub(crate) fn storage_err(error: sqlx::Error) -> PortError {
    PortError::from(DatabaseError::from(error))
}
