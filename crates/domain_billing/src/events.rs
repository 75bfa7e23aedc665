//! Domain events for the visit ledger
//!
//! Every financially significant change to a visit emits an event. Events
//! are persisted in the same transaction as the records they describe, so
//! downstream consumers never observe an event without its ledger entry or
//! an entry without its event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    ChargeId, InsuranceId, Money, PatientId, PaymentId, StaffId, VisitId, WalletId,
    WalletTransactionId,
};

use crate::charge::Department;
use crate::insurance::Coverage;
use crate::payment::PaymentMethod;
use crate::visit::PaymentStatus;

/// Domain events emitted by the visit ledger
///
/// These events capture every financial state change that occurs during
/// a visit's lifetime, from opening through closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisitEvent {
    /// A visit has been opened for a patient
    VisitOpened {
        visit_id: VisitId,
        patient_id: PatientId,
        opened_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// A department charge has been recorded
    ChargeRecorded {
        visit_id: VisitId,
        charge_id: ChargeId,
        department: Department,
        amount: Money,
        recorded_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// A compensating entry has been recorded against an earlier charge
    ChargeReversed {
        visit_id: VisitId,
        charge_id: ChargeId,
        reverses: ChargeId,
        amount: Money,
        recorded_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// A payment has been received
    PaymentRecorded {
        visit_id: VisitId,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
        external_reference: Option<String>,
        recorded_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// Part of the bill has been settled from the patient's wallet
    WalletDebitApplied {
        visit_id: VisitId,
        wallet_id: WalletId,
        transaction_id: WalletTransactionId,
        amount: Money,
        recorded_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// An insurance claim has been attached
    InsuranceAttached {
        visit_id: VisitId,
        insurance_id: InsuranceId,
        provider_name: String,
        coverage: Coverage,
        attached_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// An attached insurance claim has been approved
    InsuranceApproved {
        visit_id: VisitId,
        insurance_id: InsuranceId,
        approved_by: StaffId,
        timestamp: DateTime<Utc>,
    },

    /// The stored payment status has been promoted by a clearing pass
    PaymentStatusChanged {
        visit_id: VisitId,
        from: PaymentStatus,
        to: PaymentStatus,
        outstanding: Money,
        timestamp: DateTime<Utc>,
    },

    /// The visit has been closed
    VisitClosed {
        visit_id: VisitId,
        closed_by: StaffId,
        outstanding_at_close: Money,
        timestamp: DateTime<Utc>,
    },
}

impl VisitEvent {
    /// Returns the visit ID associated with this event
    pub fn visit_id(&self) -> VisitId {
        match self {
            VisitEvent::VisitOpened { visit_id, .. } => *visit_id,
            VisitEvent::ChargeRecorded { visit_id, .. } => *visit_id,
            VisitEvent::ChargeReversed { visit_id, .. } => *visit_id,
            VisitEvent::PaymentRecorded { visit_id, .. } => *visit_id,
            VisitEvent::WalletDebitApplied { visit_id, .. } => *visit_id,
            VisitEvent::InsuranceAttached { visit_id, .. } => *visit_id,
            VisitEvent::InsuranceApproved { visit_id, .. } => *visit_id,
            VisitEvent::PaymentStatusChanged { visit_id, .. } => *visit_id,
            VisitEvent::VisitClosed { visit_id, .. } => *visit_id,
        }
    }

    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            VisitEvent::VisitOpened { timestamp, .. } => *timestamp,
            VisitEvent::ChargeRecorded { timestamp, .. } => *timestamp,
            VisitEvent::ChargeReversed { timestamp, .. } => *timestamp,
            VisitEvent::PaymentRecorded { timestamp, .. } => *timestamp,
            VisitEvent::WalletDebitApplied { timestamp, .. } => *timestamp,
            VisitEvent::InsuranceAttached { timestamp, .. } => *timestamp,
            VisitEvent::InsuranceApproved { timestamp, .. } => *timestamp,
            VisitEvent::PaymentStatusChanged { timestamp, .. } => *timestamp,
            VisitEvent::VisitClosed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            VisitEvent::VisitOpened { .. } => "VisitOpened",
            VisitEvent::ChargeRecorded { .. } => "ChargeRecorded",
            VisitEvent::ChargeReversed { .. } => "ChargeReversed",
            VisitEvent::PaymentRecorded { .. } => "PaymentRecorded",
            VisitEvent::WalletDebitApplied { .. } => "WalletDebitApplied",
            VisitEvent::InsuranceAttached { .. } => "InsuranceAttached",
            VisitEvent::InsuranceApproved { .. } => "InsuranceApproved",
            VisitEvent::PaymentStatusChanged { .. } => "PaymentStatusChanged",
            VisitEvent::VisitClosed { .. } => "VisitClosed",
        }
    }
}
