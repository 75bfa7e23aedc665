//! Wallet DTOs

use chrono::{DateTime, Utc};
use core_kernel::{PatientId, StaffId, VisitId, WalletId, WalletTransactionId};
use domain_wallet::{Wallet, WalletTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct OpenWalletRequest {
    pub patient_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreditWalletRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: WalletId,
    pub patient_id: PatientId,
    pub balance: Decimal,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id(),
            patient_id: wallet.patient_id(),
            balance: wallet.balance().amount(),
            version: wallet.version(),
            created_at: wallet.created_at(),
            updated_at: wallet.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletTransactionResponse {
    pub id: WalletTransactionId,
    pub wallet_id: WalletId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<VisitId>,
    pub direction: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub recorded_by: StaffId,
    pub recorded_at: DateTime<Utc>,
}

impl From<&WalletTransaction> for WalletTransactionResponse {
    fn from(transaction: &WalletTransaction) -> Self {
        Self {
            id: transaction.id,
            wallet_id: transaction.wallet_id,
            visit_id: transaction.visit_id,
            direction: transaction.direction.as_str().to_string(),
            amount: transaction.amount.amount(),
            balance_after: transaction.balance_after.amount(),
            recorded_by: transaction.recorded_by,
            recorded_at: transaction.recorded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub wallet: WalletResponse,
    pub transaction: WalletTransactionResponse,
}
