//! Gateway handlers
//!
//! The webhook endpoint authenticates by HMAC signature over the raw
//! body, not by JWT. Verification is idempotent: replays of a settled
//! reference come back as `already_verified` with no second payment.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use core_kernel::{Actor, Capability, Money, VisitId};
use domain_gateway::{parse_envelope, verify_signature, Verification};
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_capability;
use crate::dto::gateway::*;
use crate::{error::ApiError, AppState};

/// Header carrying the HMAC-SHA256 signature of the webhook body
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Creates a payment intent the gateway provider will settle
pub async fn create_intent(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<IntentResponse>), ApiError> {
    require_capability(&actor, Capability::CollectPayment)?;
    request.validate()?;
    let intent = state
        .reconciler()
        .create_intent(
            VisitId::from_uuid(id),
            Money::new(request.amount),
            &request.provider,
            &actor,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(IntentResponse::from(&intent))))
}

/// Receives a settlement report from the gateway provider
///
/// The signature is checked before the body is even parsed; an envelope
/// that cannot be authenticated never reaches the reconciler. Definitive
/// failures return 200 so the provider stops retrying, while replays of
/// an already-settled reference return 409 with the original outcome.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<VerificationResponse>), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook delivery without a signature header");
            ApiError::Unauthorized
        })?;

    verify_signature(&body, signature, &state.config.webhook_secret)?;
    let envelope = parse_envelope(&body)?;

    let verification = state
        .reconciler()
        .process(&envelope, &Actor::gateway_reconciler())
        .await?;

    let status = match &verification {
        Verification::AlreadyVerified { .. } => StatusCode::CONFLICT,
        Verification::VerifiedOnce { .. } | Verification::Failed { .. } => StatusCode::OK,
    };
    Ok((status, Json(VerificationResponse::from(&verification))))
}
