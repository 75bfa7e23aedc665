//! Billing domain ports
//!
//! This module defines the storage interface the billing domain needs,
//! enabling swappable implementations (Postgres, in-memory, etc.).
//!
//! # Architecture
//!
//! `LedgerStore` is the write and read boundary for the visit ledger.
//! Every mutating method runs as one storage transaction that appends
//! the record, re-runs the clearing pass over the fresh ledger view,
//! persists any status promotion, and emits the visit's domain events.
//! A crash anywhere inside rolls the whole step back, so the stored
//! status can never drift from the records beneath it.
//!
//! Mutating methods take the acting staff member explicitly. There is
//! no ambient request context; whoever calls the port says who is
//! acting, and the adapter writes that identity into the audit trail.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::ports::LedgerStore;
//! use std::sync::Arc;
//!
//! pub struct BillingService {
//!     ledger: Arc<dyn LedgerStore>,
//! }
//!
//! impl BillingService {
//!     pub async fn collect(&self, req: RecordPaymentRequest, actor: &Actor) {
//!         let outcome = self.ledger.record_payment(req, actor).await?;
//!         if outcome.clearing.promoted() { /* notify */ }
//!     }
//! }
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;

use core_kernel::{Actor, ChargeId, DomainPort, Money, PatientId, VisitId, WalletId};

use crate::charge::{Charge, Department};
use crate::clearing::ClearingOutcome;
use crate::engine::{BillingSummary, LedgerView, WalletDebit};
use crate::error::BillingError;
use crate::events::VisitEvent;
use crate::insurance::{Coverage, Insurance};
use crate::payment::{Payment, PaymentMethod};
use crate::visit::Visit;

/// Request to record a department charge
#[derive(Debug, Clone)]
pub struct RecordChargeRequest {
    /// Visit to charge
    pub visit_id: VisitId,
    /// Department raising the charge
    pub department: Department,
    /// Service description
    pub description: String,
    /// Charge amount, strictly positive
    pub amount: Money,
}

/// Request to record a direct payment
#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    /// Visit being paid
    pub visit_id: VisitId,
    /// Amount received
    pub amount: Money,
    /// Collection method; must be a direct-entry method
    pub method: PaymentMethod,
}

/// Request to attach an insurance claim
#[derive(Debug, Clone)]
pub struct AttachInsuranceRequest {
    /// Visit the claim covers
    pub visit_id: VisitId,
    /// Insurer name
    pub provider_name: String,
    /// Policy number with the insurer
    pub policy_number: String,
    /// Coverage terms once approved
    pub coverage: Coverage,
}

/// Result of appending a charge
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    /// The stored charge
    pub charge: Charge,
    /// Clearing pass that ran in the same transaction
    pub clearing: ClearingOutcome,
}

/// Result of appending a payment
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// The stored payment
    pub payment: Payment,
    /// Clearing pass that ran in the same transaction
    pub clearing: ClearingOutcome,
}

/// Result of a wallet settlement against a visit
#[derive(Debug, Clone)]
pub struct WalletDebitOutcome {
    /// The billing-side debit record
    pub debit: WalletDebit,
    /// Wallet balance after the debit
    pub balance_after: Money,
    /// Clearing pass that ran in the same transaction
    pub clearing: ClearingOutcome,
}

/// Result of attaching or approving an insurance claim
#[derive(Debug, Clone)]
pub struct InsuranceOutcome {
    /// The claim after the operation
    pub insurance: Insurance,
    /// Clearing pass that ran in the same transaction
    pub clearing: ClearingOutcome,
}

/// The main port trait for the visit ledger
///
/// Implementations must guarantee, per mutating call:
///
/// - the visit is loaded and checked inside the transaction (an open
///   check done earlier does not count)
/// - append, clearing, status write, event append, and audit record
///   commit or roll back together
/// - stored records are never updated or deleted; violations surface
///   as `PortError::ImmutableRecord` through `BillingError::Storage`
#[async_trait]
pub trait LedgerStore: DomainPort {
    // ========================================================================
    // Visit lifecycle
    // ========================================================================

    /// Opens a new visit for a patient
    ///
    /// # Arguments
    ///
    /// * `patient_id` - The patient the visit belongs to
    /// * `actor` - Staff member opening the visit
    async fn open_visit(&self, patient_id: PatientId, actor: &Actor)
        -> Result<Visit, BillingError>;

    /// Loads a visit by ID
    ///
    /// # Returns
    ///
    /// The visit, or `PortError::NotFound` through `Storage`
    async fn visit(&self, visit_id: VisitId) -> Result<Visit, BillingError>;

    /// Lists a patient's visits, newest first
    async fn visits_for_patient(&self, patient_id: PatientId)
        -> Result<Vec<Visit>, BillingError>;

    /// Closes a visit
    ///
    /// The outstanding balance is re-derived inside the closing
    /// transaction; a stale balance from an earlier read never decides
    /// a closure.
    ///
    /// # Errors
    ///
    /// Fails when the visit is already closed, or when the re-derived
    /// balance is positive and the stored status is not Settled.
    async fn close_visit(&self, visit_id: VisitId, actor: &Actor) -> Result<Visit, BillingError>;

    // ========================================================================
    // Ledger reads
    // ========================================================================

    /// Assembles every ledger record attached to a visit
    async fn ledger_view(&self, visit_id: VisitId) -> Result<LedgerView, BillingError>;

    /// Computes a visit's current financial position
    ///
    /// Read-only; never writes the stored status.
    async fn billing_summary(&self, visit_id: VisitId) -> Result<BillingSummary, BillingError>;

    /// Returns the visit's persisted domain events, oldest first
    async fn events_for_visit(&self, visit_id: VisitId) -> Result<Vec<VisitEvent>, BillingError>;

    // ========================================================================
    // Ledger appends
    // ========================================================================

    /// Records a charge against an open visit
    async fn record_charge(
        &self,
        request: RecordChargeRequest,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError>;

    /// Records a compensating entry cancelling an earlier charge
    ///
    /// # Errors
    ///
    /// Fails when the charge does not exist on the visit, is itself a
    /// compensating entry, or was already reversed.
    async fn reverse_charge(
        &self,
        visit_id: VisitId,
        charge_id: ChargeId,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError>;

    /// Records a direct payment against an open visit
    async fn record_payment(
        &self,
        request: RecordPaymentRequest,
        actor: &Actor,
    ) -> Result<PaymentOutcome, BillingError>;

    /// Settles part of a visit's bill from a patient wallet
    ///
    /// The wallet balance check, the wallet debit, and the billing-side
    /// record are one atomic step. Concurrent debits against the same
    /// wallet serialize; the wallet can never go negative.
    ///
    /// # Errors
    ///
    /// Fails with `InsufficientWalletBalance` when the wallet cannot
    /// fund the amount.
    async fn apply_wallet_debit(
        &self,
        visit_id: VisitId,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<WalletDebitOutcome, BillingError>;

    // ========================================================================
    // Insurance
    // ========================================================================

    /// Attaches an insurance claim to an open visit
    ///
    /// # Errors
    ///
    /// Fails when the visit already carries a claim.
    async fn attach_insurance(
        &self,
        request: AttachInsuranceRequest,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError>;

    /// Approves the visit's pending claim
    ///
    /// Runs a clearing pass in the same transaction, so full coverage
    /// settles the visit at the moment of approval.
    async fn approve_insurance(
        &self,
        visit_id: VisitId,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError>;
}

/// Extension trait for LedgerStore with convenience methods
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Returns the outstanding balance of a visit
    async fn outstanding(&self, visit_id: VisitId) -> Result<Money, BillingError> {
        Ok(self.billing_summary(visit_id).await?.outstanding)
    }

    /// Records a cash payment, the common desk case
    async fn record_cash_payment(
        &self,
        visit_id: VisitId,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<PaymentOutcome, BillingError> {
        self.record_payment(
            RecordPaymentRequest {
                visit_id,
                amount: Money::new(amount),
                method: PaymentMethod::Cash,
            },
            actor,
        )
        .await
    }
}

/// Blanket implementation for all LedgerStore implementors
impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}
