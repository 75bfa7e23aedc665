//! Audit log entries
//!
//! One entry per mutating action, written in the same storage
//! transaction as the mutation itself. Entries are append-only and
//! carry who acted, in what role, from where, and a sanitized metadata
//! document for medico-legal review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_kernel::{Actor, AuditEntryId, StaffId, VisitId};

use crate::sanitize::sanitize;

/// Auditable actions, with names that stay stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    VisitOpened,
    ChargeRecorded,
    ChargeReversed,
    PaymentRecorded,
    WalletDebitApplied,
    InsuranceAttached,
    InsuranceApproved,
    VisitClosed,
    WalletOpened,
    WalletCredited,
    GatewayIntentCreated,
    GatewayPaymentVerified,
    GatewayPaymentFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::VisitOpened => "visit_opened",
            AuditAction::ChargeRecorded => "charge_recorded",
            AuditAction::ChargeReversed => "charge_reversed",
            AuditAction::PaymentRecorded => "payment_recorded",
            AuditAction::WalletDebitApplied => "wallet_debit_applied",
            AuditAction::InsuranceAttached => "insurance_attached",
            AuditAction::InsuranceApproved => "insurance_approved",
            AuditAction::VisitClosed => "visit_closed",
            AuditAction::WalletOpened => "wallet_opened",
            AuditAction::WalletCredited => "wallet_credited",
            AuditAction::GatewayIntentCreated => "gateway_intent_created",
            AuditAction::GatewayPaymentVerified => "gateway_payment_verified",
            AuditAction::GatewayPaymentFailed => "gateway_payment_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visit_opened" => Ok(AuditAction::VisitOpened),
            "charge_recorded" => Ok(AuditAction::ChargeRecorded),
            "charge_reversed" => Ok(AuditAction::ChargeReversed),
            "payment_recorded" => Ok(AuditAction::PaymentRecorded),
            "wallet_debit_applied" => Ok(AuditAction::WalletDebitApplied),
            "insurance_attached" => Ok(AuditAction::InsuranceAttached),
            "insurance_approved" => Ok(AuditAction::InsuranceApproved),
            "visit_closed" => Ok(AuditAction::VisitClosed),
            "wallet_opened" => Ok(AuditAction::WalletOpened),
            "wallet_credited" => Ok(AuditAction::WalletCredited),
            "gateway_intent_created" => Ok(AuditAction::GatewayIntentCreated),
            "gateway_payment_verified" => Ok(AuditAction::GatewayPaymentVerified),
            "gateway_payment_failed" => Ok(AuditAction::GatewayPaymentFailed),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

/// Kind of resource an entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResource {
    Visit,
    Charge,
    Payment,
    WalletTransaction,
    Wallet,
    Insurance,
    PaymentIntent,
}

impl AuditResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResource::Visit => "visit",
            AuditResource::Charge => "charge",
            AuditResource::Payment => "payment",
            AuditResource::WalletTransaction => "wallet_transaction",
            AuditResource::Wallet => "wallet",
            AuditResource::Insurance => "insurance",
            AuditResource::PaymentIntent => "payment_intent",
        }
    }
}

impl fmt::Display for AuditResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditResource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visit" => Ok(AuditResource::Visit),
            "charge" => Ok(AuditResource::Charge),
            "payment" => Ok(AuditResource::Payment),
            "wallet_transaction" => Ok(AuditResource::WalletTransaction),
            "wallet" => Ok(AuditResource::Wallet),
            "insurance" => Ok(AuditResource::Insurance),
            "payment_intent" => Ok(AuditResource::PaymentIntent),
            other => Err(format!("unknown audit resource '{}'", other)),
        }
    }
}

/// Reference to the resource an action touched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: AuditResource,
    /// Prefixed display form of the typed identifier
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: AuditResource, id: impl fmt::Display) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }
}

/// One immutable entry in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique identifier
    pub id: AuditEntryId,
    /// Staff member who acted
    pub actor_id: StaffId,
    /// Role the actor held at the time
    pub actor_role: String,
    /// What was done
    pub action: AuditAction,
    /// Visit scope, when the action has one
    pub visit_id: Option<VisitId>,
    /// The resource the action touched
    pub resource: ResourceRef,
    /// Sanitized metadata document
    pub metadata: Value,
    /// Originating IP, when known
    pub ip_address: Option<String>,
    /// Originating user agent, when known
    pub user_agent: Option<String>,
    /// When the action happened
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Builds an entry for an action, sanitizing the metadata
    ///
    /// Sanitization happens here rather than in the adapters so no
    /// write path can persist unredacted patient details.
    pub fn record(
        actor: &Actor,
        action: AuditAction,
        visit_id: Option<VisitId>,
        resource: ResourceRef,
        metadata: Value,
    ) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            actor_id: actor.staff_id(),
            actor_role: actor.role().to_string(),
            action,
            visit_id,
            resource,
            metadata: sanitize(metadata),
            ip_address: actor.ip().map(|ip| ip.to_string()),
            user_agent: actor.user_agent().map(String::from),
            recorded_at: Utc::now(),
        }
    }
}
