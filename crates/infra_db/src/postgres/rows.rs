//! Row types and shared queries for the PostgreSQL adapters
//!
//! Each row struct mirrors one table and knows how to rebuild its
//! domain type. Enum columns are stored as text in the stable wire
//! names; a value that fails to parse means the schema and the code
//! disagree, which surfaces as an internal error rather than a panic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::{
    AuditEntryId, ChargeId, InsuranceId, Money, PatientId, PaymentId, PaymentIntentId, PortError,
    Rate, StaffId, VisitId, WalletId, WalletTransactionId,
};
use domain_audit::{AuditLogEntry, ResourceRef};
use domain_billing::{
    Charge, Coverage, Insurance, Payment, Visit, VisitEvent, VisitState, WalletDebit,
};
use domain_gateway::{PaymentIntent, VerificationMarker};
use domain_wallet::{Wallet, WalletTransaction};

use super::storage_err;

/// Database row for the visits table
#[derive(Debug, FromRow)]
pub(crate) struct VisitRow {
    pub visit_id: Uuid,
    pub visit_number: String,
    pub patient_id: Uuid,
    pub state: String,
    pub payment_status: String,
    pub opened_by: Uuid,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisitRow {
    pub fn into_visit(self) -> Result<Visit, PortError> {
        let state = match self.state.as_str() {
            "OPEN" => VisitState::Open {
                opened_at: self.opened_at,
            },
            "CLOSED" => {
                let closed_at = self.closed_at.ok_or_else(|| {
                    PortError::internal(format!(
                        "visit {} is CLOSED without closed_at",
                        self.visit_id
                    ))
                })?;
                let closed_by = self.closed_by.ok_or_else(|| {
                    PortError::internal(format!(
                        "visit {} is CLOSED without closed_by",
                        self.visit_id
                    ))
                })?;
                VisitState::Closed {
                    closed_at,
                    closed_by: StaffId::from_uuid(closed_by),
                }
            }
            other => {
                return Err(PortError::internal(format!(
                    "unknown visit state '{}'",
                    other
                )))
            }
        };

        Ok(Visit::reconstitute(
            VisitId::from_uuid(self.visit_id),
            self.visit_number,
            PatientId::from_uuid(self.patient_id),
            state,
            self.payment_status.parse().map_err(PortError::internal)?,
            StaffId::from_uuid(self.opened_by),
            self.version as u32,
            self.created_at,
            self.updated_at,
        ))
    }
}

pub(crate) const VISIT_COLUMNS: &str = "visit_id, visit_number, patient_id, state, payment_status, \
     opened_by, opened_at, closed_at, closed_by, version, created_at, updated_at";

/// Loads a visit row without locking it
pub(crate) async fn fetch_visit(
    tx: &mut Transaction<'_, Postgres>,
    visit_id: Uuid,
) -> Result<Option<VisitRow>, PortError> {
    sqlx::query_as::<_, VisitRow>(&format!(
        "SELECT {} FROM visits WHERE visit_id = $1",
        VISIT_COLUMNS
    ))
    .bind(visit_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)
}

/// Loads and row-locks a visit for the rest of the transaction
///
/// Every mutating path goes through this lock, which is what serializes
/// concurrent appends, clearings and closure checks per visit.
pub(crate) async fn fetch_visit_for_update(
    tx: &mut Transaction<'_, Postgres>,
    visit_id: Uuid,
) -> Result<Option<VisitRow>, PortError> {
    sqlx::query_as::<_, VisitRow>(&format!(
        "SELECT {} FROM visits WHERE visit_id = $1 FOR UPDATE",
        VISIT_COLUMNS
    ))
    .bind(visit_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)
}

/// Database row for the charges table
#[derive(Debug, FromRow)]
pub(crate) struct ChargeRow {
    pub charge_id: Uuid,
    pub visit_id: Uuid,
    pub department: String,
    pub description: String,
    pub amount: Decimal,
    pub reverses: Option<Uuid>,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl ChargeRow {
    pub fn into_charge(self) -> Result<Charge, PortError> {
        Ok(Charge {
            id: ChargeId::from_uuid(self.charge_id),
            visit_id: VisitId::from_uuid(self.visit_id),
            department: self.department.parse().map_err(PortError::internal)?,
            description: self.description,
            amount: Money::new(self.amount),
            reverses: self.reverses.map(ChargeId::from_uuid),
            recorded_by: StaffId::from_uuid(self.recorded_by),
            recorded_at: self.recorded_at,
        })
    }
}

/// Database row for the payments table
#[derive(Debug, FromRow)]
pub(crate) struct PaymentRow {
    pub payment_id: Uuid,
    pub visit_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub external_reference: Option<String>,
    pub receipt_number: String,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentRow {
    pub fn into_payment(self) -> Result<Payment, PortError> {
        Ok(Payment {
            id: PaymentId::from_uuid(self.payment_id),
            visit_id: VisitId::from_uuid(self.visit_id),
            amount: Money::new(self.amount),
            method: self.method.parse().map_err(PortError::internal)?,
            external_reference: self.external_reference,
            receipt_number: self.receipt_number,
            recorded_by: StaffId::from_uuid(self.recorded_by),
            recorded_at: self.recorded_at,
        })
    }
}

/// Database row for the insurance_claims table
#[derive(Debug, FromRow)]
pub(crate) struct InsuranceRow {
    pub insurance_id: Uuid,
    pub visit_id: Uuid,
    pub provider_name: String,
    pub policy_number: String,
    pub coverage_kind: String,
    pub coverage_value: Decimal,
    pub status: String,
    pub attached_by: Uuid,
    pub attached_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl InsuranceRow {
    pub fn into_insurance(self) -> Result<Insurance, PortError> {
        let coverage = match self.coverage_kind.as_str() {
            "AMOUNT" => Coverage::Amount(Money::new(self.coverage_value)),
            "PERCENT" => Coverage::Percent(
                Rate::from_percent(self.coverage_value)
                    .map_err(|e| PortError::internal(e.to_string()))?,
            ),
            other => {
                return Err(PortError::internal(format!(
                    "unknown coverage kind '{}'",
                    other
                )))
            }
        };

        Ok(Insurance {
            id: InsuranceId::from_uuid(self.insurance_id),
            visit_id: VisitId::from_uuid(self.visit_id),
            provider_name: self.provider_name,
            policy_number: self.policy_number,
            coverage,
            status: self.status.parse().map_err(PortError::internal)?,
            attached_by: StaffId::from_uuid(self.attached_by),
            attached_at: self.attached_at,
            approved_by: self.approved_by.map(StaffId::from_uuid),
            approved_at: self.approved_at,
        })
    }
}

/// Database row for the wallets table
#[derive(Debug, FromRow)]
pub(crate) struct WalletRow {
    pub wallet_id: Uuid,
    pub patient_id: Uuid,
    pub balance: Decimal,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletRow {
    pub fn into_wallet(self) -> Wallet {
        Wallet::reconstitute(
            WalletId::from_uuid(self.wallet_id),
            PatientId::from_uuid(self.patient_id),
            Money::new(self.balance),
            self.version as u32,
            self.created_at,
            self.updated_at,
        )
    }
}

/// Loads and row-locks a wallet for the rest of the transaction
pub(crate) async fn fetch_wallet_for_update(
    tx: &mut Transaction<'_, Postgres>,
    wallet_id: Uuid,
) -> Result<Option<WalletRow>, PortError> {
    sqlx::query_as::<_, WalletRow>(
        r#"
        SELECT wallet_id, patient_id, balance, version, created_at, updated_at
        FROM wallets
        WHERE wallet_id = $1
        FOR UPDATE
        "#,
    )
    .bind(wallet_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)
}

/// Writes back a wallet balance and bumps its version
pub(crate) async fn update_wallet(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &mut Wallet,
) -> Result<(), PortError> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET balance = $2, version = $3, updated_at = $4
        WHERE wallet_id = $1 AND version = $5
        "#,
    )
    .bind(wallet.id().as_uuid())
    .bind(wallet.balance().amount())
    .bind((wallet.version() + 1) as i32)
    .bind(wallet.updated_at())
    .bind(wallet.version() as i32)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    if result.rows_affected() == 0 {
        return Err(PortError::conflict(format!(
            "wallet {} was modified concurrently",
            wallet.id()
        )));
    }

    wallet.bump_version();
    Ok(())
}

/// Appends a wallet transaction inside the caller's transaction
pub(crate) async fn insert_wallet_transaction(
    tx: &mut Transaction<'_, Postgres>,
    transaction: &WalletTransaction,
) -> Result<(), PortError> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            transaction_id, wallet_id, visit_id, direction, amount,
            balance_after, recorded_by, recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(transaction.id.as_uuid())
    .bind(transaction.wallet_id.as_uuid())
    .bind(transaction.visit_id.map(|v| *v.as_uuid()))
    .bind(transaction.direction.as_str())
    .bind(transaction.amount.amount())
    .bind(transaction.balance_after.amount())
    .bind(transaction.recorded_by.as_uuid())
    .bind(transaction.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok(())
}

/// Database row for the wallet_transactions table
#[derive(Debug, FromRow)]
pub(crate) struct WalletTransactionRow {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub direction: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl WalletTransactionRow {
    pub fn into_transaction(self) -> Result<WalletTransaction, PortError> {
        Ok(WalletTransaction {
            id: WalletTransactionId::from_uuid(self.transaction_id),
            wallet_id: WalletId::from_uuid(self.wallet_id),
            visit_id: self.visit_id.map(VisitId::from_uuid),
            direction: self.direction.parse().map_err(PortError::internal)?,
            amount: Money::new(self.amount),
            balance_after: Money::new(self.balance_after),
            recorded_by: StaffId::from_uuid(self.recorded_by),
            recorded_at: self.recorded_at,
        })
    }
}

/// Billing-side projection row for visit-funding wallet debits
#[derive(Debug, FromRow)]
pub(crate) struct WalletDebitRow {
    pub transaction_id: Uuid,
    pub visit_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
}

impl WalletDebitRow {
    pub fn into_debit(self) -> WalletDebit {
        WalletDebit {
            transaction_id: WalletTransactionId::from_uuid(self.transaction_id),
            visit_id: VisitId::from_uuid(self.visit_id),
            wallet_id: WalletId::from_uuid(self.wallet_id),
            amount: Money::new(self.amount),
        }
    }
}

/// Database row for the payment_intents table
#[derive(Debug, FromRow)]
pub(crate) struct IntentRow {
    pub intent_id: Uuid,
    pub visit_id: Uuid,
    pub amount: Decimal,
    pub provider: String,
    pub external_reference: String,
    pub state: String,
    pub failure_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntentRow {
    pub fn into_intent(self) -> Result<PaymentIntent, PortError> {
        Ok(PaymentIntent {
            id: PaymentIntentId::from_uuid(self.intent_id),
            visit_id: VisitId::from_uuid(self.visit_id),
            amount: Money::new(self.amount),
            provider: self.provider,
            external_reference: self.external_reference,
            state: self.state.parse().map_err(PortError::internal)?,
            failure_reason: self.failure_reason,
            created_by: StaffId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for the verification_markers table
#[derive(Debug, FromRow)]
pub(crate) struct MarkerRow {
    pub external_reference: String,
    pub payment_id: Uuid,
    pub verified_at: DateTime<Utc>,
}

impl MarkerRow {
    pub fn into_marker(self) -> VerificationMarker {
        VerificationMarker {
            external_reference: self.external_reference,
            payment_id: PaymentId::from_uuid(self.payment_id),
            verified_at: self.verified_at,
        }
    }
}

/// Database row for the visit_events table
#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub payload: Value,
}

impl EventRow {
    pub fn into_event(self) -> Result<VisitEvent, PortError> {
        serde_json::from_value(self.payload)
            .map_err(|e| PortError::internal(format!("undecodable visit event: {}", e)))
    }
}

/// Database row for the audit_log table
#[derive(Debug, FromRow)]
pub(crate) struct AuditRow {
    pub entry_id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub action: String,
    pub visit_id: Option<Uuid>,
    pub resource_kind: String,
    pub resource_id: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRow {
    pub fn into_entry(self) -> Result<AuditLogEntry, PortError> {
        Ok(AuditLogEntry {
            id: AuditEntryId::from_uuid(self.entry_id),
            actor_id: StaffId::from_uuid(self.actor_id),
            actor_role: self.actor_role,
            action: self.action.parse().map_err(PortError::internal)?,
            visit_id: self.visit_id.map(VisitId::from_uuid),
            resource: ResourceRef {
                kind: self.resource_kind.parse().map_err(PortError::internal)?,
                id: self.resource_id,
            },
            metadata: self.metadata,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            recorded_at: self.recorded_at,
        })
    }
}

/// Appends an audit entry inside the caller's transaction
///
/// Mutating adapters call this so the audit record commits or rolls
/// back with the mutation it describes.
pub(crate) async fn insert_audit_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &AuditLogEntry,
) -> Result<(), PortError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (
            entry_id, actor_id, actor_role, action, visit_id,
            resource_kind, resource_id, metadata, ip_address, user_agent,
            recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.actor_id.as_uuid())
    .bind(&entry.actor_role)
    .bind(entry.action.as_str())
    .bind(entry.visit_id.map(|v| *v.as_uuid()))
    .bind(entry.resource.kind.as_str())
    .bind(&entry.resource.id)
    .bind(&entry.metadata)
    .bind(entry.ip_address.as_deref())
    .bind(entry.user_agent.as_deref())
    .bind(entry.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok(())
}

/// Appends visit events inside the caller's transaction
pub(crate) async fn insert_visit_events(
    tx: &mut Transaction<'_, Postgres>,
    events: &[VisitEvent],
) -> Result<(), PortError> {
    for event in events {
        let payload = serde_json::to_value(event)
            .map_err(|e| PortError::internal(format!("unencodable visit event: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO visit_events (event_id, visit_id, event_type, payload, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(event.visit_id().as_uuid())
        .bind(event.event_type())
        .bind(payload)
        .bind(event.timestamp())
        .execute(&mut **tx)
        .await
        .map_err(storage_err)?;
    }

    Ok(())
}

/// Writes back the mutable slice of a visit row and bumps its version
///
/// The caller holds the row lock; the version predicate is a belt
/// against writes that slipped past it.
pub(crate) async fn update_visit(
    tx: &mut Transaction<'_, Postgres>,
    visit: &mut Visit,
) -> Result<(), PortError> {
    let (closed_at, closed_by) = match visit.state() {
        VisitState::Open { .. } => (None, None),
        VisitState::Closed {
            closed_at,
            closed_by,
        } => (Some(*closed_at), Some(closed_by.as_uuid())),
    };
    let state = match visit.state() {
        VisitState::Open { .. } => "OPEN",
        VisitState::Closed { .. } => "CLOSED",
    };

    let result = sqlx::query(
        r#"
        UPDATE visits
        SET state = $2,
            payment_status = $3,
            closed_at = $4,
            closed_by = $5,
            version = $6,
            updated_at = $7
        WHERE visit_id = $1 AND version = $8
        "#,
    )
    .bind(visit.id().as_uuid())
    .bind(state)
    .bind(visit.payment_status().as_str())
    .bind(closed_at)
    .bind(closed_by)
    .bind((visit.version() + 1) as i32)
    .bind(visit.updated_at())
    .bind(visit.version() as i32)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    if result.rows_affected() == 0 {
        return Err(PortError::conflict(format!(
            "visit {} was modified concurrently",
            visit.id()
        )));
    }

    visit.bump_version();
    Ok(())
}
