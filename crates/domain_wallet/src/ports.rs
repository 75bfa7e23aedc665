//! Wallet domain ports
//!
//! `WalletStore` covers wallet lifecycle and top-ups. Debits that settle
//! a visit's bill are not here: those run through the billing ledger's
//! `apply_wallet_debit`, which couples the balance check, the debit row
//! and the visit's clearing pass into one storage transaction. Both
//! sides use the arithmetic in [`crate::ledger`], so the overdraft rule
//! cannot diverge between adapters.

use async_trait::async_trait;

use core_kernel::{Actor, DomainPort, Money, PatientId, WalletId};

use crate::error::WalletError;
use crate::transaction::WalletTransaction;
use crate::wallet::Wallet;

/// Result of a wallet top-up
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    /// The wallet after the credit applied
    pub wallet: Wallet,
    /// The appended transaction row
    pub transaction: WalletTransaction,
}

/// The main port trait for wallet storage
///
/// Implementations serialize concurrent movements per wallet (row lock
/// or equivalent) and never expose update or delete of transaction rows.
#[async_trait]
pub trait WalletStore: DomainPort {
    /// Opens a wallet for a patient
    ///
    /// # Errors
    ///
    /// Fails with a conflict when the patient already has a wallet.
    async fn open_wallet(&self, patient_id: PatientId, actor: &Actor)
        -> Result<Wallet, WalletError>;

    /// Loads a wallet by ID
    async fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, WalletError>;

    /// Loads a patient's wallet
    async fn wallet_for_patient(&self, patient_id: PatientId) -> Result<Wallet, WalletError>;

    /// Tops up a wallet
    async fn credit(
        &self,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<CreditOutcome, WalletError>;

    /// Returns a wallet's transactions, oldest first
    ///
    /// The ordering is the replay order: folding the returned rows from
    /// zero must reproduce the stored balance.
    async fn transactions(&self, wallet_id: WalletId)
        -> Result<Vec<WalletTransaction>, WalletError>;
}
