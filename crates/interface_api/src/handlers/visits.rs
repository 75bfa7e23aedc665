//! Visit and ledger handlers
//!
//! Every mutation goes through the ledger port, which runs the clearing
//! pass in the same transaction and rewrites the visit's stored payment
//! status. Responses echo the clearing result so desk staff see the
//! status change their action caused.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{Actor, Capability, ChargeId, Money, PatientId, Rate, VisitId, WalletId};
use domain_billing::{Coverage, GateAction, GateDecision, PaymentGate};
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_capability;
use crate::dto::visits::*;
use crate::{error::ApiError, AppState};

/// Opens a new visit for a patient
pub async fn open_visit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<OpenVisitRequest>,
) -> Result<(StatusCode, Json<VisitResponse>), ApiError> {
    require_capability(&actor, Capability::RecordCharge)?;
    let visit = state
        .ledger
        .open_visit(PatientId::from_uuid(request.patient_id), &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(VisitResponse::from(&visit))))
}

/// Returns the visit's billing summary alongside its stored status
pub async fn billing_summary(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BillingSummaryResponse>, ApiError> {
    require_capability(&actor, Capability::ViewBilling)?;
    let visit_id = VisitId::from_uuid(id);
    let visit = state.ledger.visit(visit_id).await?;
    let summary = state.ledger.billing_summary(visit_id).await?;
    Ok(Json(BillingSummaryResponse::from_parts(
        &summary,
        visit.payment_status(),
    )))
}

/// Records a charge against an open visit
pub async fn record_charge(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordChargeRequest>,
) -> Result<Json<ChargeResponse>, ApiError> {
    require_capability(&actor, Capability::RecordCharge)?;
    request.validate()?;
    let outcome = state
        .ledger
        .record_charge(
            domain_billing::RecordChargeRequest {
                visit_id: VisitId::from_uuid(id),
                department: request.department,
                description: request.description,
                amount: Money::new(request.amount),
            },
            &actor,
        )
        .await?;
    Ok(Json(ChargeResponse::from(&outcome)))
}

/// Records a compensating entry cancelling an earlier charge
pub async fn reverse_charge(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, charge_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChargeResponse>, ApiError> {
    require_capability(&actor, Capability::RecordCharge)?;
    let outcome = state
        .ledger
        .reverse_charge(
            VisitId::from_uuid(id),
            ChargeId::from_uuid(charge_id),
            &actor,
        )
        .await?;
    Ok(Json(ChargeResponse::from(&outcome)))
}

/// Records a payment collected directly at the desk
///
/// Gateway, wallet and insurance settlements have dedicated flows and
/// are rejected here.
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    require_capability(&actor, Capability::CollectPayment)?;
    let outcome = state
        .ledger
        .record_payment(
            domain_billing::RecordPaymentRequest {
                visit_id: VisitId::from_uuid(id),
                amount: Money::new(request.amount),
                method: request.method,
            },
            &actor,
        )
        .await?;
    Ok(Json(PaymentResponse::from(&outcome)))
}

/// Settles part of the visit's bill from a patient wallet
pub async fn apply_wallet_debit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<WalletDebitRequest>,
) -> Result<Json<WalletDebitResponse>, ApiError> {
    require_capability(&actor, Capability::DebitWallet)?;
    let outcome = state
        .ledger
        .apply_wallet_debit(
            VisitId::from_uuid(id),
            WalletId::from_uuid(request.wallet_id),
            Money::new(request.amount),
            &actor,
        )
        .await?;
    Ok(Json(WalletDebitResponse::from(&outcome)))
}

/// Attaches a pending insurance claim to the visit
pub async fn attach_insurance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachInsuranceRequest>,
) -> Result<Json<InsuranceResponse>, ApiError> {
    require_capability(&actor, Capability::AttachInsurance)?;
    request.validate()?;
    let coverage = match (request.coverage_amount, request.coverage_percent) {
        (Some(amount), None) => Coverage::Amount(Money::new(amount)),
        (None, Some(percent)) => Coverage::Percent(
            Rate::from_percent(percent).map_err(|e| ApiError::Validation(e.to_string()))?,
        ),
        _ => {
            return Err(ApiError::Validation(
                "Provide exactly one of coverage_amount or coverage_percent".to_string(),
            ))
        }
    };
    let outcome = state
        .ledger
        .attach_insurance(
            domain_billing::AttachInsuranceRequest {
                visit_id: VisitId::from_uuid(id),
                provider_name: request.provider_name,
                policy_number: request.policy_number,
                coverage,
            },
            &actor,
        )
        .await?;
    Ok(Json(InsuranceResponse::from(&outcome)))
}

/// Approves the visit's pending insurance claim
pub async fn approve_insurance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveInsuranceRequest>,
) -> Result<Json<InsuranceResponse>, ApiError> {
    require_capability(&actor, Capability::ApproveInsurance)?;
    if !request.approve {
        return Err(ApiError::Validation(
            "Approval cannot be withdrawn; send approve=true".to_string(),
        ));
    }
    let outcome = state
        .ledger
        .approve_insurance(VisitId::from_uuid(id), &actor)
        .await?;
    Ok(Json(InsuranceResponse::from(&outcome)))
}

/// Closes the visit
///
/// Rejected with a structured 402 while the stored status leaves money
/// outstanding.
pub async fn close_visit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisitResponse>, ApiError> {
    require_capability(&actor, Capability::CloseVisit)?;
    let visit = state
        .ledger
        .close_visit(VisitId::from_uuid(id), &actor)
        .await?;
    Ok(Json(VisitResponse::from(&visit)))
}

/// Asks the payment gate whether the actor may perform an action
///
/// The decision is a document, not an error: denials come back as 200
/// with the denial kind, details and unlock actions.
pub async fn gate_check(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(action): Json<GateAction>,
) -> Result<Json<GateDecision>, ApiError> {
    let visit_id = VisitId::from_uuid(id);
    let visit = state.ledger.visit(visit_id).await?;
    let summary = state.ledger.billing_summary(visit_id).await?;
    let decision = PaymentGate::new().authorize(&visit, &summary, &action, &actor);
    Ok(Json(decision))
}
