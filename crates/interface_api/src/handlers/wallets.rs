//! Wallet handlers
//!
//! Top-ups only. Debits settle visits and live on the visit routes so
//! the balance check and the clearing pass share one transaction.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{Actor, Capability, Money, PatientId, WalletId};
use uuid::Uuid;

use crate::auth::require_capability;
use crate::dto::wallets::*;
use crate::{error::ApiError, AppState};

/// Opens a wallet for a patient
pub async fn open_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<OpenWalletRequest>,
) -> Result<(StatusCode, Json<WalletResponse>), ApiError> {
    require_capability(&actor, Capability::TopUpWallet)?;
    let wallet = state
        .wallets
        .open_wallet(PatientId::from_uuid(request.patient_id), &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(WalletResponse::from(&wallet))))
}

/// Returns a wallet's current balance
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<WalletResponse>, ApiError> {
    require_capability(&actor, Capability::ViewBilling)?;
    let wallet = state.wallets.wallet(WalletId::from_uuid(id)).await?;
    Ok(Json(WalletResponse::from(&wallet)))
}

/// Tops up a wallet
pub async fn credit_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreditWalletRequest>,
) -> Result<Json<CreditResponse>, ApiError> {
    require_capability(&actor, Capability::TopUpWallet)?;
    let outcome = state
        .wallets
        .credit(WalletId::from_uuid(id), Money::new(request.amount), &actor)
        .await?;
    Ok(Json(CreditResponse {
        wallet: WalletResponse::from(&outcome.wallet),
        transaction: WalletTransactionResponse::from(&outcome.transaction),
    }))
}
