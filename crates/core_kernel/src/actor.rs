//! Actor identity and capabilities
//!
//! Every mutating operation receives the acting staff member explicitly as
//! an [`Actor`] value. The actor carries a capability set resolved once at
//! the API boundary, plus the request origin (IP, user agent) recorded into
//! the audit trail. There is no ambient request context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

use crate::identifiers::StaffId;

/// Fine-grained permissions checked at the enforcement gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewBilling,
    RecordCharge,
    CollectPayment,
    TopUpWallet,
    DebitWallet,
    AttachInsurance,
    ApproveInsurance,
    CloseVisit,
    PerformClinicalAction,
    ViewAuditTrail,
}

impl Capability {
    /// All capabilities, for administrative actors and test fixtures
    pub fn all() -> Vec<Capability> {
        vec![
            Capability::ViewBilling,
            Capability::RecordCharge,
            Capability::CollectPayment,
            Capability::TopUpWallet,
            Capability::DebitWallet,
            Capability::AttachInsurance,
            Capability::ApproveInsurance,
            Capability::CloseVisit,
            Capability::PerformClinicalAction,
            Capability::ViewAuditTrail,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ViewBilling => "view_billing",
            Capability::RecordCharge => "record_charge",
            Capability::CollectPayment => "collect_payment",
            Capability::TopUpWallet => "top_up_wallet",
            Capability::DebitWallet => "debit_wallet",
            Capability::AttachInsurance => "attach_insurance",
            Capability::ApproveInsurance => "approve_insurance",
            Capability::CloseVisit => "close_visit",
            Capability::PerformClinicalAction => "perform_clinical_action",
            Capability::ViewAuditTrail => "view_audit_trail",
        };
        write!(f, "{}", name)
    }
}

/// A set of capabilities held by an actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Creates an empty capability set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds a capability to the set
    pub fn grant(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Returns true if the set holds the capability
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Reserved identity for payments materialized by gateway reconciliation
const RECONCILER_STAFF_UUID: Uuid = Uuid::from_u128(0x0000_0000_0000_7000_8000_0000_0000_0001);

/// The staff member (or system identity) performing an operation
///
/// Actors are resolved from authentication claims at the API boundary and
/// passed by reference into every mutating call, so audit entries can record
/// who acted, in which role, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    staff_id: StaffId,
    role: String,
    capabilities: CapabilitySet,
    ip: Option<IpAddr>,
    user_agent: Option<String>,
}

impl Actor {
    /// Creates an actor with the given identity, role label and capabilities
    pub fn new(staff_id: StaffId, role: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            staff_id,
            role: role.into(),
            capabilities,
            ip: None,
            user_agent: None,
        }
    }

    /// Attaches the request origin for audit recording
    pub fn with_origin(mut self, ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }

    /// The system identity that records payments settled by the gateway
    /// reconciler, which has no interactive staff session behind it
    pub fn gateway_reconciler() -> Self {
        Self::new(
            StaffId::from_uuid(RECONCILER_STAFF_UUID),
            "gateway-reconciler",
            CapabilitySet::new().grant(Capability::CollectPayment),
        )
    }

    pub fn staff_id(&self) -> StaffId {
        self.staff_id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns true if the actor holds the capability
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}
