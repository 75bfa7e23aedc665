//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the visit billing ports, plus an in-memory
//! store for tests and local development. Schema migrations live under
//! `migrations/` and are embedded into the binary.
//!
//! # Architecture
//!
//! Each domain port gets one adapter over a shared connection pool. The
//! adapters own the transaction boundaries: a mutating call locks the
//! visit row, appends the record, re-runs the clearing pass, and writes
//! the status, events and audit entry before committing.
//!
//! The schema enforces the append-only rule independently of any Rust
//! code path: triggers reject UPDATE and DELETE on financial records
//! with a dedicated SQLSTATE that surfaces as
//! `PortError::ImmutableRecord`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, PgLedgerStore};
//!
//! let pool = create_pool(config).await?;
//! run_migrations(&pool).await?;
//! let ledger = PgLedgerStore::new(pool.clone());
//! ```

pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;

pub use error::{DatabaseError, IMMUTABLE_SQLSTATE};
pub use memory::InMemoryStore;
pub use pool::{
    create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool,
};
pub use postgres::{PgAuditSink, PgGatewayStore, PgLedgerStore, PgWalletStore};
