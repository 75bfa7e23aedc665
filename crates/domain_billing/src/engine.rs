//! Billing computation
//!
//! `BillingEngine` derives a visit's financial position from the raw
//! ledger records. It is pure: it reads a snapshot, produces a summary,
//! and never touches storage or the stored payment status. Persisting a
//! derived status is the clearing pass's job.

use serde::{Deserialize, Serialize};

use core_kernel::{Money, VisitId, WalletId, WalletTransactionId};

use crate::charge::Charge;
use crate::error::BillingError;
use crate::insurance::Insurance;
use crate::payment::Payment;
use crate::visit::PaymentStatus;

/// A wallet settlement applied to a visit's bill
///
/// This is the billing-side projection of a wallet transaction. The
/// wallet ledger owns the full transaction record; billing only needs
/// the amount that settled part of this visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDebit {
    /// Wallet transaction that funded the settlement
    pub transaction_id: WalletTransactionId,
    /// Visit the settlement applies to
    pub visit_id: VisitId,
    /// Wallet the money came from
    pub wallet_id: WalletId,
    /// Amount settled
    pub amount: Money,
}

/// Snapshot of every ledger record attached to one visit
///
/// Storage adapters assemble this inside the same transaction as the
/// write that triggered recomputation, so the engine always sees a
/// consistent picture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerView {
    pub visit_id: VisitId,
    pub charges: Vec<Charge>,
    pub payments: Vec<Payment>,
    pub wallet_debits: Vec<WalletDebit>,
    pub insurance: Option<Insurance>,
}

impl LedgerView {
    /// Creates an empty view for a visit
    pub fn new(visit_id: VisitId) -> Self {
        Self {
            visit_id,
            charges: Vec::new(),
            payments: Vec::new(),
            wallet_debits: Vec::new(),
            insurance: None,
        }
    }
}

/// The derived financial position of a visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSummary {
    /// Visit the summary describes
    pub visit_id: VisitId,
    /// Sum of all charges, reversals included
    pub total_charges: Money,
    /// Coverage from an approved insurance claim
    pub approved_coverage: Money,
    /// Coverage from a still-pending claim; shown to staff but never
    /// subtracted from what the patient owes
    pub pending_coverage: Money,
    /// What the patient owes after approved coverage, floored at zero
    pub patient_payable: Money,
    /// Direct and gateway payments received
    pub total_payments: Money,
    /// Wallet settlements applied
    pub total_wallet_debits: Money,
    /// Everything received toward the patient share
    pub total_received: Money,
    /// Patient payable minus everything received; negative means the
    /// patient holds a credit
    pub outstanding: Money,
    /// Status derived from this snapshot
    pub derived_status: PaymentStatus,
}

impl BillingSummary {
    /// True when nothing is owed
    pub fn is_cleared(&self) -> bool {
        !self.outstanding.is_positive()
    }

    /// Overpayment held in the patient's favor, zero when balance is owed
    pub fn credit(&self) -> Money {
        (-self.outstanding).max_zero()
    }
}

/// Pure computation service for visit billing
///
/// Every financial question about a visit is answered here and nowhere
/// else: what the patient owes, what has been received, and which
/// payment status the records justify.
#[derive(Debug, Clone, Copy)]
pub struct BillingEngine;

impl BillingEngine {
    /// Creates a new billing engine
    pub fn new() -> Self {
        Self
    }

    /// Computes the financial position of a visit
    ///
    /// # Errors
    ///
    /// Returns an error if any record in the view belongs to a different
    /// visit, or if summing the amounts overflows.
    pub fn compute(&self, view: &LedgerView) -> Result<BillingSummary, BillingError> {
        // Every record must belong to the visit under computation
        for charge in &view.charges {
            ensure_owned(view.visit_id, charge.visit_id)?;
        }
        for payment in &view.payments {
            ensure_owned(view.visit_id, payment.visit_id)?;
        }
        for debit in &view.wallet_debits {
            ensure_owned(view.visit_id, debit.visit_id)?;
        }
        if let Some(insurance) = &view.insurance {
            ensure_owned(view.visit_id, insurance.visit_id)?;
        }

        let total_charges = Money::checked_sum(view.charges.iter().map(|c| &c.amount))
            .map_err(|e| BillingError::Financial(e.to_string()))?;

        let (approved_coverage, pending_coverage) = match &view.insurance {
            Some(claim) if claim.is_approved() => {
                (claim.coverage_against(total_charges), Money::zero())
            }
            Some(claim) => (Money::zero(), claim.coverage_against(total_charges)),
            None => (Money::zero(), Money::zero()),
        };

        let patient_payable = total_charges
            .checked_sub(&approved_coverage)
            .map_err(|e| BillingError::Financial(e.to_string()))?
            .max_zero();

        // Wallet and insurance settlements count through their own lanes
        let total_payments = Money::checked_sum(
            view.payments
                .iter()
                .filter(|p| p.method.counts_toward_patient_payments())
                .map(|p| &p.amount),
        )
        .map_err(|e| BillingError::Financial(e.to_string()))?;

        let total_wallet_debits =
            Money::checked_sum(view.wallet_debits.iter().map(|d| &d.amount))
                .map_err(|e| BillingError::Financial(e.to_string()))?;

        let total_received = total_payments
            .checked_add(&total_wallet_debits)
            .map_err(|e| BillingError::Financial(e.to_string()))?;

        let outstanding = patient_payable
            .checked_sub(&total_received)
            .map_err(|e| BillingError::Financial(e.to_string()))?;

        let derived_status = derive_status(view.insurance.as_ref(), outstanding, total_received);

        Ok(BillingSummary {
            visit_id: view.visit_id,
            total_charges,
            approved_coverage,
            pending_coverage,
            patient_payable,
            total_payments,
            total_wallet_debits,
            total_received,
            outstanding,
            derived_status,
        })
    }
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_owned(expected: VisitId, found: VisitId) -> Result<(), BillingError> {
    if found != expected {
        return Err(BillingError::ForeignRecord { expected, found });
    }
    Ok(())
}

/// Derives the payment status a record snapshot justifies
///
/// Precedence, first match wins:
/// 1. A pending claim holds the visit at InsurancePending no matter
///    what has been paid
/// 2. An approved claim with nothing outstanding is Settled
/// 3. Nothing outstanding with money received is Paid
/// 4. Money received with a balance remaining is PartiallyPaid
/// 5. Otherwise Unpaid
fn derive_status(
    insurance: Option<&Insurance>,
    outstanding: Money,
    total_received: Money,
) -> PaymentStatus {
    if let Some(claim) = insurance {
        if claim.is_pending() {
            return PaymentStatus::InsurancePending;
        }
        if !outstanding.is_positive() {
            return PaymentStatus::Settled;
        }
    }

    if !outstanding.is_positive() && total_received.is_positive() {
        return PaymentStatus::Paid;
    }
    if total_received.is_positive() {
        return PaymentStatus::PartiallyPaid;
    }

    PaymentStatus::Unpaid
}
