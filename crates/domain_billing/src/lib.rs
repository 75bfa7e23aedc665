//! Billing Domain - Visit Ledger and Payment Enforcement
//!
//! This crate implements the financial core of the visit platform: an
//! append-only ledger of charges, payments, wallet settlements and
//! insurance claims per visit, a pure computation engine that derives
//! the financial position from those records, and the gate that blocks
//! clinical actions until a visit's stored payment status clears.
//!
//! # Ledger Principles
//!
//! - Records are immutable once written; corrections are compensating
//!   entries, never edits
//! - The stored payment status is authoritative and changes only through
//!   a clearing pass
//! - Clearing runs in the same storage transaction as the append that
//!   triggered it
//! - Every mutation names the acting staff member explicitly
//!
//! # Payment Status Lifecycle
//!
//! ```text
//! Unpaid -> PartiallyPaid -> Paid
//!       \-> InsurancePending -> InsuranceClaimed -> Settled
//!                           \-> Settled
//! ```
//!
//! Promotions are monotonic: a visit that reached Paid or Settled keeps
//! its clearance even when later charges reopen a balance.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingEngine, PaymentGate, GateAction};
//!
//! let summary = BillingEngine::new().compute(&ledger_view)?;
//! let decision = PaymentGate::new().authorize(&visit, &summary, &action, &actor);
//! if !decision.is_allowed() {
//!     // render denial with unlock actions
//! }
//! ```

pub mod charge;
pub mod clearing;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod insurance;
pub mod payment;
pub mod ports;
pub mod visit;

pub use charge::{Charge, Department};
pub use clearing::{ClearingOutcome, ClearingService};
pub use engine::{BillingEngine, BillingSummary, LedgerView, WalletDebit};
pub use error::BillingError;
pub use events::VisitEvent;
pub use gate::{DenialKind, GateAction, GateDecision, PaymentGate, UnlockAction};
pub use insurance::{Coverage, Insurance, InsuranceStatus};
pub use payment::{Payment, PaymentMethod};
pub use ports::{
    AttachInsuranceRequest, ChargeOutcome, InsuranceOutcome, LedgerStore, LedgerStoreExt,
    PaymentOutcome, RecordChargeRequest, RecordPaymentRequest, WalletDebitOutcome,
};
pub use visit::{PaymentStatus, Visit, VisitState};
