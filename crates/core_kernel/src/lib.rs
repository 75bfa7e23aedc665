//! Core Kernel - Foundational types for the visit billing system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money with precise decimal arithmetic in the facility currency
//! - Strongly-typed identifiers
//! - Actor identity with capability sets threaded through every mutation

pub mod actor;
pub mod identifiers;
pub mod money;
pub mod ports;

pub use actor::{Actor, Capability, CapabilitySet};
pub use identifiers::{
    AuditEntryId, ChargeId, InsuranceId, PatientId, PaymentId, PaymentIntentId, StaffId, VisitId,
    WalletId, WalletTransactionId,
};
pub use money::{Money, MoneyError, Rate};
pub use ports::{DomainPort, PortError, RecordKind};
