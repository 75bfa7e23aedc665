//! Visit aggregate root
//!
//! The visit is the consistency boundary for everything billed during a
//! patient encounter. It carries the stored payment status, which is the
//! only status the rest of the platform may act on.
//!
//! # Invariants
//!
//! - The stored payment status changes only through a clearing pass,
//!   never as a side effect of reads
//! - A closed visit accepts no further charges, payments, or claims
//! - Closure requires the outstanding balance to be zero or negative,
//!   unless the stored status is already Settled
//!
//! # State Machine
//!
//! Visits move in one direction:
//! - Open -> Closed (via close)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Money, PatientId, StaffId, VisitId};

use crate::error::BillingError;
use crate::events::VisitEvent;

/// Stored payment status of a visit
///
/// Written only by clearing passes. Every gate decision and closure
/// check reads this stored value, never a freshly derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No patient money received yet
    Unpaid,
    /// Some patient money received, balance remains
    PartiallyPaid,
    /// Patient share fully received
    Paid,
    /// An insurance claim is attached and awaiting approval
    InsurancePending,
    /// Insurance approved but a patient share is still owed
    InsuranceClaimed,
    /// Insurance approved and nothing is owed
    Settled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::PartiallyPaid => "PARTIALLY_PAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::InsurancePending => "INSURANCE_PENDING",
            PaymentStatus::InsuranceClaimed => "INSURANCE_CLAIMED",
            PaymentStatus::Settled => "SETTLED",
        }
    }

    /// True when this status clears payment-gated actions
    pub fn satisfies_payment_gate(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Settled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentStatus::Unpaid),
            "PARTIALLY_PAID" => Ok(PaymentStatus::PartiallyPaid),
            "PAID" => Ok(PaymentStatus::Paid),
            "INSURANCE_PENDING" => Ok(PaymentStatus::InsurancePending),
            "INSURANCE_CLAIMED" => Ok(PaymentStatus::InsuranceClaimed),
            "SETTLED" => Ok(PaymentStatus::Settled),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Visit lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitState {
    /// Visit is open and accepting ledger records
    Open {
        /// When the visit was opened
        opened_at: DateTime<Utc>,
    },

    /// Visit is closed; the ledger beneath it is frozen
    Closed {
        /// When the visit was closed
        closed_at: DateTime<Utc>,
        /// Staff member who closed it
        closed_by: StaffId,
    },
}

/// The Visit aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    /// Unique visit identifier
    id: VisitId,
    /// Human-readable visit number
    visit_number: String,
    /// Patient this visit belongs to
    patient_id: PatientId,
    /// Current lifecycle state
    state: VisitState,
    /// Stored payment status
    payment_status: PaymentStatus,
    /// Staff member who opened the visit
    opened_by: StaffId,
    /// Domain events to be published
    #[serde(skip)]
    events: Vec<VisitEvent>,
    /// Version for optimistic concurrency
    version: u32,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl Visit {
    /// Opens a new visit for a patient
    pub fn open(patient_id: PatientId, opened_by: StaffId) -> Self {
        let now = Utc::now();
        let id = VisitId::new_v7();

        Self {
            id,
            visit_number: generate_visit_number(),
            patient_id,
            state: VisitState::Open { opened_at: now },
            payment_status: PaymentStatus::Unpaid,
            opened_by,
            events: vec![VisitEvent::VisitOpened {
                visit_id: id,
                patient_id,
                opened_by,
                timestamp: now,
            }],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a visit from persisted state
    ///
    /// Used by storage adapters when loading. The event buffer starts
    /// empty; only new changes emit events.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: VisitId,
        visit_number: String,
        patient_id: PatientId,
        state: VisitState,
        payment_status: PaymentStatus,
        opened_by: StaffId,
        version: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            visit_number,
            patient_id,
            state,
            payment_status,
            opened_by,
            events: Vec::new(),
            version,
            created_at,
            updated_at,
        }
    }

    /// Returns the visit ID
    pub fn id(&self) -> VisitId {
        self.id
    }

    /// Returns the visit number
    pub fn visit_number(&self) -> &str {
        &self.visit_number
    }

    /// Returns the patient ID
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    /// Returns the current state
    pub fn state(&self) -> &VisitState {
        &self.state
    }

    /// Returns the stored payment status
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Returns the staff member who opened the visit
    pub fn opened_by(&self) -> StaffId {
        self.opened_by
    }

    /// Returns the concurrency version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns accumulated domain events and clears them
    pub fn take_events(&mut self) -> Vec<VisitEvent> {
        std::mem::take(&mut self.events)
    }

    /// Checks if the visit is open
    pub fn is_open(&self) -> bool {
        matches!(self.state, VisitState::Open { .. })
    }

    /// Checks if the visit is closed
    pub fn is_closed(&self) -> bool {
        matches!(self.state, VisitState::Closed { .. })
    }

    /// Fails unless the visit is still open
    ///
    /// Storage adapters call this before appending any ledger record.
    pub fn ensure_open(&self) -> Result<(), BillingError> {
        if self.is_closed() {
            return Err(BillingError::VisitClosed { visit_id: self.id });
        }
        Ok(())
    }

    /// Applies the stored status a clearing pass resolved
    ///
    /// Returns `Some((from, to))` when the status actually moved,
    /// `None` when the resolved status matches what is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the visit is closed and the resolved status
    /// differs from the stored one. A closed visit's ledger is frozen,
    /// so a differing resolution means the records beneath it changed
    /// when they must not have.
    pub fn apply_clearing(
        &mut self,
        resolved: PaymentStatus,
        outstanding: Money,
    ) -> Result<Option<(PaymentStatus, PaymentStatus)>, BillingError> {
        if resolved == self.payment_status {
            return Ok(None);
        }
        if self.is_closed() {
            return Err(BillingError::VisitClosed { visit_id: self.id });
        }

        let from = self.payment_status;
        let now = Utc::now();

        self.payment_status = resolved;
        self.updated_at = now;

        self.events.push(VisitEvent::PaymentStatusChanged {
            visit_id: self.id,
            from,
            to: resolved,
            outstanding,
            timestamp: now,
        });

        Ok(Some((from, resolved)))
    }

    /// Closes the visit
    ///
    /// # Arguments
    ///
    /// * `closed_by` - Staff member performing the closure
    /// * `outstanding` - Outstanding balance re-derived inside the same
    ///   transaction that commits the closure
    ///
    /// # Errors
    ///
    /// Returns an error if the visit is already closed, or if the
    /// outstanding balance is positive and the stored status is not
    /// Settled.
    pub fn close(&mut self, closed_by: StaffId, outstanding: Money) -> Result<(), BillingError> {
        match &self.state {
            VisitState::Open { .. } => {
                if outstanding.is_positive() && self.payment_status != PaymentStatus::Settled {
                    return Err(BillingError::OutstandingBalance {
                        visit_id: self.id,
                        outstanding: outstanding.amount(),
                        stored_status: self.payment_status,
                    });
                }

                let now = Utc::now();

                self.state = VisitState::Closed {
                    closed_at: now,
                    closed_by,
                };
                self.updated_at = now;

                self.events.push(VisitEvent::VisitClosed {
                    visit_id: self.id,
                    closed_by,
                    outstanding_at_close: outstanding,
                    timestamp: now,
                });

                Ok(())
            }
            VisitState::Closed { .. } => Err(BillingError::VisitClosed { visit_id: self.id }),
        }
    }

    /// Bumps the concurrency version after a successful persist
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

/// Generates a unique visit number
///
/// Format: VST-{YEAR}{MONTH}-{SEQUENCE}
fn generate_visit_number() -> String {
    let now = Utc::now();
    let random_seq: u32 = rand_sequence();
    format!(
        "VST-{}{:02}-{:06}",
        now.format("%Y"),
        now.format("%m"),
        random_seq
    )
}

/// Generates a pseudo-random sequence for visit numbers
fn rand_sequence() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (duration.as_nanos() % 1_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_visit() -> Visit {
        Visit::open(PatientId::new(), StaffId::new())
    }

    #[test]
    fn test_new_visit_is_open_and_unpaid() {
        let mut visit = open_visit();

        assert!(visit.is_open());
        assert_eq!(visit.payment_status(), PaymentStatus::Unpaid);
        assert!(visit.visit_number().starts_with("VST-"));
        assert_eq!(visit.version(), 1);

        let events = visit.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "VisitOpened");
        assert!(visit.take_events().is_empty());
    }

    #[test]
    fn test_clearing_promotes_status_and_emits_event() {
        let mut visit = open_visit();
        visit.take_events();

        let change = visit
            .apply_clearing(PaymentStatus::PartiallyPaid, Money::new(dec!(3000)))
            .unwrap();
        assert_eq!(
            change,
            Some((PaymentStatus::Unpaid, PaymentStatus::PartiallyPaid))
        );
        assert_eq!(visit.payment_status(), PaymentStatus::PartiallyPaid);

        let events = visit.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "PaymentStatusChanged");
    }

    #[test]
    fn test_clearing_with_unchanged_status_is_silent() {
        let mut visit = open_visit();
        visit.take_events();

        let change = visit
            .apply_clearing(PaymentStatus::Unpaid, Money::new(dec!(3000)))
            .unwrap();
        assert_eq!(change, None);
        assert!(visit.take_events().is_empty());
    }

    #[test]
    fn test_close_blocked_while_balance_outstanding() {
        let mut visit = open_visit();

        let result = visit.close(StaffId::new(), Money::new(dec!(1500)));
        assert!(matches!(
            result,
            Err(BillingError::OutstandingBalance { .. })
        ));
        assert!(visit.is_open());
    }

    #[test]
    fn test_close_allowed_at_zero_outstanding() {
        let mut visit = open_visit();
        visit.take_events();

        visit.close(StaffId::new(), Money::zero()).unwrap();
        assert!(visit.is_closed());

        let events = visit.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "VisitClosed");
    }

    #[test]
    fn test_close_allowed_with_credit_balance() {
        let mut visit = open_visit();
        visit
            .apply_clearing(PaymentStatus::Paid, Money::new(dec!(-500)))
            .unwrap();

        assert!(visit.close(StaffId::new(), Money::new(dec!(-500))).is_ok());
    }

    #[test]
    fn test_settled_status_overrides_outstanding_check() {
        let mut visit = open_visit();
        visit
            .apply_clearing(PaymentStatus::Settled, Money::zero())
            .unwrap();

        // Stored status wins even when the recomputed balance is positive
        assert!(visit.close(StaffId::new(), Money::new(dec!(100))).is_ok());
    }

    #[test]
    fn test_double_close_rejected() {
        let mut visit = open_visit();
        visit.close(StaffId::new(), Money::zero()).unwrap();

        let result = visit.close(StaffId::new(), Money::zero());
        assert!(matches!(result, Err(BillingError::VisitClosed { .. })));
    }

    #[test]
    fn test_closed_visit_rejects_status_change() {
        let mut visit = open_visit();
        visit.close(StaffId::new(), Money::zero()).unwrap();

        let result = visit.apply_clearing(PaymentStatus::Paid, Money::zero());
        assert!(matches!(result, Err(BillingError::VisitClosed { .. })));

        // An unchanged resolution stays fine after closure
        let unchanged = visit.apply_clearing(PaymentStatus::Unpaid, Money::zero());
        assert_eq!(unchanged.unwrap(), None);
    }

    #[test]
    fn test_ensure_open() {
        let mut visit = open_visit();
        assert!(visit.ensure_open().is_ok());

        visit.close(StaffId::new(), Money::zero()).unwrap();
        assert!(matches!(
            visit.ensure_open(),
            Err(BillingError::VisitClosed { .. })
        ));
    }

    #[test]
    fn test_payment_gate_statuses() {
        assert!(PaymentStatus::Paid.satisfies_payment_gate());
        assert!(PaymentStatus::Settled.satisfies_payment_gate());
        assert!(!PaymentStatus::Unpaid.satisfies_payment_gate());
        assert!(!PaymentStatus::PartiallyPaid.satisfies_payment_gate());
        assert!(!PaymentStatus::InsurancePending.satisfies_payment_gate());
        assert!(!PaymentStatus::InsuranceClaimed.satisfies_payment_gate());
    }

    #[test]
    fn test_status_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::InsurancePending).unwrap();
        assert_eq!(json, "\"INSURANCE_PENDING\"");
        let back: PaymentStatus = serde_json::from_str("\"PARTIALLY_PAID\"").unwrap();
        assert_eq!(back, PaymentStatus::PartiallyPaid);
    }
}
