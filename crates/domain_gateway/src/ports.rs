//! Gateway domain ports
//!
//! This module defines the storage interface the gateway domain needs,
//! enabling swappable implementations (Postgres, in-memory, etc.).
//!
//! # Architecture
//!
//! `GatewayStore` persists payment intents and the verification markers
//! that make webhook processing idempotent. A marker is written in the
//! same storage transaction that records the gateway payment against
//! the visit ledger; its unique external reference is what guarantees
//! at-most-once settlement no matter how many times the provider
//! retries a delivery.
//!
//! The reconciliation sequence is two-phased on purpose. First
//! `begin_verification` persists the VERIFYING state on its own, so a
//! crash mid-verification leaves a visible in-flight intent rather
//! than a silent retry. Then `settle_verified` performs the whole
//! settlement (marker, payment, clearing, SETTLED state) atomically.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_gateway::ports::GatewayStore;
//! use std::sync::Arc;
//!
//! pub struct Reconciler {
//!     store: Arc<dyn GatewayStore>,
//! }
//!
//! impl Reconciler {
//!     pub async fn settle(&self, reference: &str, actor: &Actor) {
//!         self.store.begin_verification(reference).await?;
//!         let outcome = self.store.settle_verified(reference, actor).await?;
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Actor, DomainPort, Money, PaymentId, PaymentIntentId, VisitId};

use crate::error::GatewayError;
use crate::intent::PaymentIntent;

/// Proof that an external reference has been verified and settled
///
/// One marker exists per settled reference, ever. The duplicate-key
/// conflict on this record is what collapses concurrent deliveries of
/// the same webhook into a single settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMarker {
    /// The external reference the marker covers
    pub external_reference: String,
    /// The ledger payment the settlement produced
    pub payment_id: PaymentId,
    /// When verification concluded
    pub verified_at: DateTime<Utc>,
}

/// Result of settling a verified intent
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// The intent, now SETTLED
    pub intent: PaymentIntent,
    /// The gateway payment recorded against the visit
    pub payment_id: PaymentId,
}

// ============================================================================
// GatewayStore
// ============================================================================

/// Storage port for payment intents and verification markers
#[async_trait]
pub trait GatewayStore: DomainPort {
    // ------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------

    /// Creates a payment intent for a visit
    ///
    /// The visit must exist and be open. The generated external
    /// reference is unique across all intents.
    ///
    /// # Errors
    ///
    /// Returns an error if the visit is unknown or closed, or the
    /// amount is not positive.
    async fn create_intent(
        &self,
        visit_id: VisitId,
        amount: Money,
        provider: &str,
        actor: &Actor,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Fetches an intent by id
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Storage` with a not-found kind if no
    /// intent exists.
    async fn intent(&self, intent_id: PaymentIntentId) -> Result<PaymentIntent, GatewayError>;

    /// Fetches an intent by its external reference
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnknownReference` if no intent carries
    /// the reference.
    async fn intent_by_reference(&self, reference: &str) -> Result<PaymentIntent, GatewayError>;

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Looks up the verification marker for a reference, if one exists
    async fn verification_marker(
        &self,
        reference: &str,
    ) -> Result<Option<VerificationMarker>, GatewayError>;

    /// Moves the intent under `reference` into VERIFYING and persists it
    ///
    /// Idempotent for an intent already verifying. This write commits
    /// before verification work proceeds, so an interrupted run leaves
    /// an observable in-flight state instead of nothing.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnknownReference` for an unknown
    /// reference, or an invalid-transition error for a terminal intent.
    async fn begin_verification(&self, reference: &str) -> Result<PaymentIntent, GatewayError>;

    /// Settles a verifying intent in one atomic transaction
    ///
    /// Writes the verification marker, records the gateway payment
    /// against the visit ledger, re-runs clearing, and moves the
    /// intent to SETTLED. Either all of it commits or none of it does.
    ///
    /// # Errors
    ///
    /// Returns a conflict-kind storage error when a marker for the
    /// reference already exists (a concurrent delivery settled first).
    async fn settle_verified(
        &self,
        reference: &str,
        actor: &Actor,
    ) -> Result<SettlementOutcome, GatewayError>;

    /// Fails the intent under `reference` definitively
    ///
    /// No marker is written and no payment is recorded. The reason is
    /// stored on the intent for operator follow-up.
    async fn record_failure(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<PaymentIntent, GatewayError>;
}
