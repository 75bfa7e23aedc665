//! Payment enforcement gate
//!
//! The gate answers one question: may this actor perform this action on
//! this visit right now. Denials are structured so the caller can render
//! a precise reason and the actions that would unblock the visit.
//!
//! Clinical actions gate on the visit's *stored* payment status. The
//! freshly derived summary rides along as advisory context only; acting
//! on it directly would let an uncommitted balance open or close the
//! gate before clearing has spoken.

use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Actor, Capability};

use crate::charge::Department;
use crate::engine::BillingSummary;
use crate::visit::{PaymentStatus, Visit};

/// Actions the gate can authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GateAction {
    /// A clinical service in a department (consult, lab order, dispense)
    Clinical { department: Department },
    RecordCharge,
    CollectPayment,
    TopUpWallet,
    DebitWallet,
    AttachInsurance,
    ApproveInsurance,
    CloseVisit,
    ViewBilling,
    ViewAuditTrail,
}

impl GateAction {
    /// Capability an actor must hold for this action
    pub fn required_capability(&self) -> Capability {
        match self {
            GateAction::Clinical { .. } => Capability::PerformClinicalAction,
            GateAction::RecordCharge => Capability::RecordCharge,
            GateAction::CollectPayment => Capability::CollectPayment,
            GateAction::TopUpWallet => Capability::TopUpWallet,
            GateAction::DebitWallet => Capability::DebitWallet,
            GateAction::AttachInsurance => Capability::AttachInsurance,
            GateAction::ApproveInsurance => Capability::ApproveInsurance,
            GateAction::CloseVisit => Capability::CloseVisit,
            GateAction::ViewBilling => Capability::ViewBilling,
            GateAction::ViewAuditTrail => Capability::ViewAuditTrail,
        }
    }

    /// Read-only actions stay available after a visit closes
    pub fn is_read_only(&self) -> bool {
        matches!(self, GateAction::ViewBilling | GateAction::ViewAuditTrail)
    }
}

/// Why an action was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialKind {
    /// Actor lacks the required capability
    RoleProhibited,
    /// Visit is closed and the action would change it
    VisitClosed,
    /// Stored payment status has not cleared the visit for care
    PaymentNotCleared,
}

impl DenialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialKind::RoleProhibited => "ROLE_PROHIBITED",
            DenialKind::VisitClosed => "VISIT_CLOSED",
            DenialKind::PaymentNotCleared => "PAYMENT_NOT_CLEARED",
        }
    }
}

impl fmt::Display for DenialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What would unblock a payment-gated visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockAction {
    CollectPayment,
    DebitWallet,
    ApproveInsurance,
}

/// Outcome of a gate check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allowed {
        /// Stored status the decision was made on
        stored_status: PaymentStatus,
        /// Freshly derived position, advisory only
        advisory: BillingSummary,
    },
    Denied {
        kind: DenialKind,
        details: String,
        /// Actions that could unblock the visit, payment denials only
        unlock_actions: Vec<UnlockAction>,
        /// Stored status the decision was made on
        stored_status: PaymentStatus,
        /// Freshly derived position, advisory only
        advisory: Option<BillingSummary>,
    },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }

    /// Denial kind, if denied
    pub fn denial_kind(&self) -> Option<DenialKind> {
        match self {
            GateDecision::Allowed { .. } => None,
            GateDecision::Denied { kind, .. } => Some(*kind),
        }
    }
}

/// Enforces payment and role policy in front of visit actions
pub struct PaymentGate;

impl PaymentGate {
    /// Creates a new gate
    pub fn new() -> Self {
        Self
    }

    /// Authorizes an action against a visit
    ///
    /// Checks run in a fixed order: capability, visit lifecycle, then
    /// payment clearance for clinical actions. The first failing check
    /// produces the denial.
    pub fn authorize(
        &self,
        visit: &Visit,
        summary: &BillingSummary,
        action: &GateAction,
        actor: &Actor,
    ) -> GateDecision {
        let stored_status = visit.payment_status();

        let required = action.required_capability();
        if !actor.can(required) {
            tracing::warn!(
                visit_id = %visit.id(),
                role = actor.role(),
                required = %required,
                "gate denied: capability missing"
            );
            return GateDecision::Denied {
                kind: DenialKind::RoleProhibited,
                details: format!("Role '{}' does not hold the '{}' capability", actor.role(), required),
                unlock_actions: Vec::new(),
                stored_status,
                advisory: None,
            };
        }

        if visit.is_closed() && !action.is_read_only() {
            tracing::warn!(visit_id = %visit.id(), "gate denied: visit closed");
            return GateDecision::Denied {
                kind: DenialKind::VisitClosed,
                details: format!("Visit {} is closed", visit.id()),
                unlock_actions: Vec::new(),
                stored_status,
                advisory: None,
            };
        }

        if matches!(action, GateAction::Clinical { .. }) && !stored_status.satisfies_payment_gate()
        {
            let mut unlock_actions = vec![UnlockAction::CollectPayment, UnlockAction::DebitWallet];
            if summary.pending_coverage.is_positive() {
                unlock_actions.push(UnlockAction::ApproveInsurance);
            }

            tracing::warn!(
                visit_id = %visit.id(),
                stored_status = %stored_status,
                outstanding = %summary.outstanding,
                "gate denied: payment not cleared"
            );
            return GateDecision::Denied {
                kind: DenialKind::PaymentNotCleared,
                details: format!(
                    "Visit {} is {} with {} outstanding",
                    visit.id(),
                    stored_status,
                    summary.outstanding
                ),
                unlock_actions,
                stored_status,
                advisory: Some(summary.clone()),
            };
        }

        GateDecision::Allowed {
            stored_status,
            advisory: summary.clone(),
        }
    }
}

impl Default for PaymentGate {
    fn default() -> Self {
        Self::new()
    }
}
