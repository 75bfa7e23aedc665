//! PostgreSQL wallet store
//!
//! Lifecycle and top-ups only. Visit-settling debits live on the ledger
//! side so the balance check and the clearing pass share a transaction.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{Actor, DomainPort, Money, PatientId, PortError, WalletId};
use domain_audit::{AuditAction, AuditLogEntry, AuditResource, ResourceRef};
use domain_wallet::{CreditOutcome, Wallet, WalletError, WalletStore, WalletTransaction};

use super::rows::{
    fetch_wallet_for_update, insert_audit_entry, insert_wallet_transaction, update_wallet,
    WalletRow, WalletTransactionRow,
};
use super::storage_err;

/// PostgreSQL implementation of the wallet port
#[derive(Debug, Clone)]
pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    /// Creates a new wallet store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgWalletStore {}

#[async_trait]
impl WalletStore for PgWalletStore {
    #[instrument(skip(self, actor), fields(patient_id = %patient_id))]
    async fn open_wallet(
        &self,
        patient_id: PatientId,
        actor: &Actor,
    ) -> Result<Wallet, WalletError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM wallets WHERE patient_id = $1")
                .bind(patient_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_err)?;
        if existing > 0 {
            return Err(PortError::conflict(format!(
                "patient {} already has a wallet",
                patient_id
            ))
            .into());
        }

        let wallet = Wallet::open(patient_id);

        sqlx::query(
            r#"
            INSERT INTO wallets (
                wallet_id, patient_id, balance, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(wallet.id().as_uuid())
        .bind(wallet.patient_id().as_uuid())
        .bind(wallet.balance().amount())
        .bind(wallet.version() as i32)
        .bind(wallet.created_at())
        .bind(wallet.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::WalletOpened,
            None,
            ResourceRef::new(AuditResource::Wallet, wallet.id()),
            json!({ "patient_id": patient_id.to_string() }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(wallet_id = %wallet.id(), "wallet opened");
        Ok(wallet)
    }

    async fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, WalletError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            SELECT wallet_id, patient_id, balance, version, created_at, updated_at
            FROM wallets
            WHERE wallet_id = $1
            "#,
        )
        .bind(wallet_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::not_found("Wallet", wallet_id))?;

        Ok(row.into_wallet())
    }

    async fn wallet_for_patient(&self, patient_id: PatientId) -> Result<Wallet, WalletError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            SELECT wallet_id, patient_id, balance, version, created_at, updated_at
            FROM wallets
            WHERE patient_id = $1
            "#,
        )
        .bind(patient_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::not_found("Wallet", patient_id))?;

        Ok(row.into_wallet())
    }

    #[instrument(skip(self, actor), fields(wallet_id = %wallet_id, amount = %amount))]
    async fn credit(
        &self,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<CreditOutcome, WalletError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut wallet = fetch_wallet_for_update(&mut tx, *wallet_id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("Wallet", wallet_id))?
            .into_wallet();

        let transaction: WalletTransaction = wallet.credit(amount, actor.staff_id())?;

        insert_wallet_transaction(&mut tx, &transaction).await?;
        update_wallet(&mut tx, &mut wallet).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::WalletCredited,
            None,
            ResourceRef::new(AuditResource::WalletTransaction, transaction.id),
            json!({
                "wallet_id": wallet_id.to_string(),
                "amount": transaction.amount,
                "balance_after": transaction.balance_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            transaction_id = %transaction.id,
            balance_after = %wallet.balance(),
            "wallet credited"
        );
        Ok(CreditOutcome {
            wallet,
            transaction,
        })
    }

    async fn transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(
            r#"
            SELECT transaction_id, wallet_id, visit_id, direction, amount,
                   balance_after, recorded_by, recorded_at
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY seq
            "#,
        )
        .bind(wallet_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(row.into_transaction()?);
        }
        Ok(transactions)
    }
}
