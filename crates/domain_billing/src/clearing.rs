//! Payment clearing
//!
//! Clearing is the only writer of a visit's stored payment status. A
//! clearing pass runs inside the same storage transaction as the ledger
//! append that triggered it: recompute the summary, resolve what the
//! stored status should become, apply it to the aggregate. If the
//! transaction aborts, records and status roll back together, so a crash
//! between append and promotion cannot leave the two disagreeing.
//!
//! Resolution is monotonic. A visit that reached Paid or Settled keeps
//! its clearance even when later charges reopen a balance; the balance
//! itself still blocks closure.

use serde::{Deserialize, Serialize};

use crate::engine::{BillingEngine, BillingSummary, LedgerView};
use crate::error::BillingError;
use crate::visit::{PaymentStatus, Visit};

/// Result of one clearing pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingOutcome {
    /// Summary the pass computed
    pub summary: BillingSummary,
    /// Stored status before the pass
    pub status_before: PaymentStatus,
    /// Stored status after the pass
    pub status_after: PaymentStatus,
}

impl ClearingOutcome {
    /// True when the pass moved the stored status
    pub fn promoted(&self) -> bool {
        self.status_before != self.status_after
    }
}

/// Resolves the stored status a clearing pass should write
///
/// Returns `None` when the stored status stays as it is.
///
/// The table promotes, never demotes:
/// - Settled is terminal
/// - A summary that derives Settled promotes any stored status
/// - An approved claim with a patient share still owed books the visit
///   as InsuranceClaimed, unless it already cleared the gate
/// - Paid and InsurancePending promote out of the unpaid family
/// - PartiallyPaid promotes out of Unpaid only
pub fn resolve(stored: PaymentStatus, summary: &BillingSummary) -> Option<PaymentStatus> {
    if stored == PaymentStatus::Settled {
        return None;
    }
    if summary.derived_status == PaymentStatus::Settled {
        return Some(PaymentStatus::Settled);
    }

    // Approved claim, patient share outstanding. The engine derives the
    // plain payment statuses here; the ledger books it as claimed.
    if summary.approved_coverage.is_positive() && summary.outstanding.is_positive() {
        return match stored {
            PaymentStatus::Unpaid
            | PaymentStatus::PartiallyPaid
            | PaymentStatus::InsurancePending => Some(PaymentStatus::InsuranceClaimed),
            _ => None,
        };
    }

    match (summary.derived_status, stored) {
        (
            PaymentStatus::Paid,
            PaymentStatus::Unpaid | PaymentStatus::PartiallyPaid | PaymentStatus::InsurancePending,
        ) => Some(PaymentStatus::Paid),
        (
            PaymentStatus::InsurancePending,
            PaymentStatus::Unpaid | PaymentStatus::PartiallyPaid,
        ) => Some(PaymentStatus::InsurancePending),
        (PaymentStatus::PartiallyPaid, PaymentStatus::Unpaid) => {
            Some(PaymentStatus::PartiallyPaid)
        }
        _ => None,
    }
}

/// Runs clearing passes against visit aggregates
#[derive(Debug, Clone, Copy)]
pub struct ClearingService {
    engine: BillingEngine,
}

impl ClearingService {
    /// Creates a new clearing service
    pub fn new() -> Self {
        Self {
            engine: BillingEngine::new(),
        }
    }

    /// Recomputes a visit's summary and applies the resolved status
    ///
    /// The caller supplies a ledger view read inside its current storage
    /// transaction and persists the visit and its events inside that same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the view is inconsistent or the aggregate
    /// rejects the status change.
    pub fn run(&self, visit: &mut Visit, view: &LedgerView) -> Result<ClearingOutcome, BillingError> {
        let summary = self.engine.compute(view)?;
        let status_before = visit.payment_status();

        let status_after = match resolve(status_before, &summary) {
            Some(next) => {
                visit.apply_clearing(next, summary.outstanding)?;
                next
            }
            None => status_before,
        };

        Ok(ClearingOutcome {
            summary,
            status_before,
            status_after,
        })
    }
}

impl Default for ClearingService {
    fn default() -> Self {
        Self::new()
    }
}
