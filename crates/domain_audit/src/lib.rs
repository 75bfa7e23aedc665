//! Audit domain for the visit billing platform
//!
//! Every mutating action on a visit ledger, wallet, or payment intent
//! produces one [`AuditLogEntry`] in the same storage transaction as
//! the mutation. Entries name the actor, their role at the time, the
//! resource touched, and where the request came from. Metadata is
//! sanitized before it is built into an entry, so patient-identifying
//! content never reaches storage.
//!
//! The trail is append-only. There is no API to change or remove an
//! entry, and the storage adapters reject such writes outright.

pub mod entry;
pub mod error;
pub mod ports;
pub mod sanitize;

pub use entry::{AuditAction, AuditLogEntry, AuditResource, ResourceRef};
pub use error::AuditError;
pub use ports::{AuditPage, AuditSink};
pub use sanitize::{sanitize, REDACTED};
