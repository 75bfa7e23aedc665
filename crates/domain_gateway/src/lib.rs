//! Gateway domain for the visit billing platform
//!
//! Online card and transfer payments flow through an external provider.
//! This crate owns the local half of that conversation: the payment
//! intent a cashier creates, the signed webhook the provider sends
//! back, and the reconciliation that turns a delivery into at most one
//! gateway payment on the visit ledger.
//!
//! Intent lifecycle:
//!
//! ```text
//! CREATED ──> VERIFYING ──> VERIFIED ──> SETTLED
//!    │           │
//!    └───────────┴──> FAILED
//! ```
//!
//! No gateway payment is ever recorded straight from a webhook body.
//! The delivery must carry a valid HMAC signature, match an intent by
//! reference, match its amount, and win the verification marker. The
//! marker is unique per reference, which is what makes a retried or
//! duplicated delivery a no-op.

pub mod error;
pub mod intent;
pub mod ports;
pub mod reconciler;
pub mod webhook;

pub use error::GatewayError;
pub use intent::{IntentState, PaymentIntent};
pub use ports::{GatewayStore, SettlementOutcome, VerificationMarker};
pub use reconciler::{GatewayReconciler, Verification};
pub use webhook::{
    compute_signature, parse_envelope, verify_signature, WebhookEnvelope, WebhookStatus,
};
