//! Gateway DTOs

use chrono::{DateTime, Utc};
use core_kernel::{PaymentId, PaymentIntentId, StaffId, VisitId};
use domain_gateway::{PaymentIntent, Verification};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub id: PaymentIntentId,
    pub visit_id: VisitId,
    pub amount: Decimal,
    pub provider: String,
    pub external_reference: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_by: StaffId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&PaymentIntent> for IntentResponse {
    fn from(intent: &PaymentIntent) -> Self {
        Self {
            id: intent.id,
            visit_id: intent.visit_id,
            amount: intent.amount.amount(),
            provider: intent.provider.clone(),
            external_reference: intent.external_reference.clone(),
            state: intent.state.as_str().to_string(),
            failure_reason: intent.failure_reason.clone(),
            created_by: intent.created_by,
            created_at: intent.created_at,
            updated_at: intent.updated_at,
        }
    }
}

/// Outcome of one webhook delivery
///
/// A repeat delivery reports `already_verified` so the provider can see
/// the money was counted exactly once.
#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub outcome: String,
    pub intent: IntentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Verification> for VerificationResponse {
    fn from(verification: &Verification) -> Self {
        match verification {
            Verification::VerifiedOnce { intent, payment_id } => Self {
                outcome: "verified_once".to_string(),
                intent: IntentResponse::from(intent),
                payment_id: Some(*payment_id),
                reason: None,
            },
            Verification::AlreadyVerified { intent, payment_id } => Self {
                outcome: "already_verified".to_string(),
                intent: IntentResponse::from(intent),
                payment_id: Some(*payment_id),
                reason: None,
            },
            Verification::Failed { intent, reason } => Self {
                outcome: "failed".to_string(),
                intent: IntentResponse::from(intent),
                payment_id: None,
                reason: Some(reason.clone()),
            },
        }
    }
}
