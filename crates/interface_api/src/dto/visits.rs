//! Visit and ledger DTOs

use chrono::{DateTime, Utc};
use core_kernel::{
    ChargeId, InsuranceId, PatientId, PaymentId, StaffId, VisitId, WalletId, WalletTransactionId,
};
use domain_billing::{
    BillingSummary, ChargeOutcome, ClearingOutcome, Coverage, Department, InsuranceOutcome,
    PaymentMethod, PaymentOutcome, PaymentStatus, Visit, VisitState, WalletDebitOutcome,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct OpenVisitRequest {
    pub patient_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordChargeRequest {
    pub department: Department,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct WalletDebitRequest {
    pub wallet_id: Uuid,
    pub amount: Decimal,
}

/// Attach request; exactly one of the coverage fields must be set
#[derive(Debug, Deserialize, Validate)]
pub struct AttachInsuranceRequest {
    #[validate(length(min = 1, max = 200))]
    pub provider_name: String,
    #[validate(length(min = 1, max = 100))]
    pub policy_number: String,
    pub coverage_amount: Option<Decimal>,
    pub coverage_percent: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveInsuranceRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub id: VisitId,
    pub visit_number: String,
    pub patient_id: PatientId,
    pub state: String,
    pub payment_status: String,
    pub opened_by: StaffId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<StaffId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Visit> for VisitResponse {
    fn from(visit: &Visit) -> Self {
        let (state, closed_at, closed_by) = match visit.state() {
            VisitState::Open { .. } => ("OPEN".to_string(), None, None),
            VisitState::Closed {
                closed_at,
                closed_by,
            } => ("CLOSED".to_string(), Some(*closed_at), Some(*closed_by)),
        };
        Self {
            id: visit.id(),
            visit_number: visit.visit_number().to_string(),
            patient_id: visit.patient_id(),
            state,
            payment_status: visit.payment_status().as_str().to_string(),
            opened_by: visit.opened_by(),
            closed_at,
            closed_by,
            created_at: visit.created_at(),
            updated_at: visit.updated_at(),
        }
    }
}

/// Result of the clearing pass that ran inside the mutation's transaction
#[derive(Debug, Serialize)]
pub struct ClearingResponse {
    pub status_before: String,
    pub status_after: String,
    pub outstanding: Decimal,
}

impl From<&ClearingOutcome> for ClearingResponse {
    fn from(outcome: &ClearingOutcome) -> Self {
        Self {
            status_before: outcome.status_before.as_str().to_string(),
            status_after: outcome.status_after.as_str().to_string(),
            outstanding: outcome.summary.outstanding.amount(),
        }
    }
}

/// Full billing breakdown for a visit
///
/// Derived figures are advisory; `stored_status` is the value enforcement
/// reads.
#[derive(Debug, Serialize)]
pub struct BillingSummaryResponse {
    pub visit_id: VisitId,
    pub stored_status: String,
    pub derived_status: String,
    pub total_charges: Decimal,
    pub approved_coverage: Decimal,
    pub pending_coverage: Decimal,
    pub patient_payable: Decimal,
    pub total_payments: Decimal,
    pub total_wallet_debits: Decimal,
    pub total_received: Decimal,
    pub outstanding: Decimal,
    pub credit: Decimal,
}

impl BillingSummaryResponse {
    pub fn from_parts(summary: &BillingSummary, stored_status: PaymentStatus) -> Self {
        Self {
            visit_id: summary.visit_id,
            stored_status: stored_status.as_str().to_string(),
            derived_status: summary.derived_status.as_str().to_string(),
            total_charges: summary.total_charges.amount(),
            approved_coverage: summary.approved_coverage.amount(),
            pending_coverage: summary.pending_coverage.amount(),
            patient_payable: summary.patient_payable.amount(),
            total_payments: summary.total_payments.amount(),
            total_wallet_debits: summary.total_wallet_debits.amount(),
            total_received: summary.total_received.amount(),
            outstanding: summary.outstanding.amount(),
            credit: summary.credit().amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    pub id: ChargeId,
    pub visit_id: VisitId,
    pub department: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<ChargeId>,
    pub recorded_by: StaffId,
    pub recorded_at: DateTime<Utc>,
    pub clearing: ClearingResponse,
}

impl From<&ChargeOutcome> for ChargeResponse {
    fn from(outcome: &ChargeOutcome) -> Self {
        let charge = &outcome.charge;
        Self {
            id: charge.id,
            visit_id: charge.visit_id,
            department: charge.department.as_str().to_string(),
            description: charge.description.clone(),
            amount: charge.amount.amount(),
            reverses: charge.reverses,
            recorded_by: charge.recorded_by,
            recorded_at: charge.recorded_at,
            clearing: ClearingResponse::from(&outcome.clearing),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub visit_id: VisitId,
    pub amount: Decimal,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    pub receipt_number: String,
    pub recorded_by: StaffId,
    pub recorded_at: DateTime<Utc>,
    pub clearing: ClearingResponse,
}

impl From<&PaymentOutcome> for PaymentResponse {
    fn from(outcome: &PaymentOutcome) -> Self {
        let payment = &outcome.payment;
        Self {
            id: payment.id,
            visit_id: payment.visit_id,
            amount: payment.amount.amount(),
            method: payment.method.as_str().to_string(),
            external_reference: payment.external_reference.clone(),
            receipt_number: payment.receipt_number.clone(),
            recorded_by: payment.recorded_by,
            recorded_at: payment.recorded_at,
            clearing: ClearingResponse::from(&outcome.clearing),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletDebitResponse {
    pub transaction_id: WalletTransactionId,
    pub visit_id: VisitId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub clearing: ClearingResponse,
}

impl From<&WalletDebitOutcome> for WalletDebitResponse {
    fn from(outcome: &WalletDebitOutcome) -> Self {
        Self {
            transaction_id: outcome.debit.transaction_id,
            visit_id: outcome.debit.visit_id,
            wallet_id: outcome.debit.wallet_id,
            amount: outcome.debit.amount.amount(),
            balance_after: outcome.balance_after.amount(),
            clearing: ClearingResponse::from(&outcome.clearing),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InsuranceResponse {
    pub id: InsuranceId,
    pub visit_id: VisitId,
    pub provider_name: String,
    pub policy_number: String,
    pub coverage_kind: String,
    pub coverage_value: Decimal,
    pub status: String,
    pub attached_by: StaffId,
    pub attached_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<StaffId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    pub clearing: ClearingResponse,
}

impl From<&InsuranceOutcome> for InsuranceResponse {
    fn from(outcome: &InsuranceOutcome) -> Self {
        let insurance = &outcome.insurance;
        let coverage_value = match insurance.coverage {
            Coverage::Amount(amount) => amount.amount(),
            Coverage::Percent(rate) => rate.percent(),
        };
        Self {
            id: insurance.id,
            visit_id: insurance.visit_id,
            provider_name: insurance.provider_name.clone(),
            policy_number: insurance.policy_number.clone(),
            coverage_kind: insurance.coverage.kind().to_string(),
            coverage_value,
            status: insurance.status.as_str().to_string(),
            attached_by: insurance.attached_by,
            attached_at: insurance.attached_at,
            approved_by: insurance.approved_by,
            approved_at: insurance.approved_at,
            clearing: ClearingResponse::from(&outcome.clearing),
        }
    }
}
