//! PostgreSQL visit ledger
//!
//! Implements `LedgerStore` with one transaction per mutating call. The
//! visit row is locked first, the record is appended, the ledger view is
//! re-read inside the same transaction, the clearing pass runs, and the
//! visit update, event rows and audit entry commit together. Nothing
//! here updates or deletes a financial record; the append-only triggers
//! reject any such statement regardless.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use core_kernel::{Actor, ChargeId, DomainPort, Money, PatientId, PortError, VisitId, WalletId};
use domain_audit::{AuditAction, AuditLogEntry, AuditResource, ResourceRef};
use domain_billing::{
    AttachInsuranceRequest, BillingEngine, BillingError, BillingSummary, Charge, ChargeOutcome,
    ClearingService, Coverage, Insurance, InsuranceOutcome, LedgerStore, LedgerView, Payment,
    PaymentOutcome, RecordChargeRequest, RecordPaymentRequest, Visit, VisitEvent, WalletDebit,
    WalletDebitOutcome,
};
use domain_wallet::{WalletError, WalletTransaction};

use super::rows::{
    fetch_visit, fetch_visit_for_update, fetch_wallet_for_update, insert_audit_entry,
    insert_visit_events, insert_wallet_transaction, update_visit, update_wallet, ChargeRow,
    EventRow, InsuranceRow, PaymentRow, VisitRow, WalletDebitRow, VISIT_COLUMNS,
};
use super::storage_err;

/// PostgreSQL implementation of the visit ledger port
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    clearing: ClearingService,
    engine: BillingEngine,
}

impl PgLedgerStore {
    /// Creates a new ledger store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clearing: ClearingService::new(),
            engine: BillingEngine::new(),
        }
    }

    async fn locked_visit(
        tx: &mut Transaction<'_, Postgres>,
        visit_id: VisitId,
    ) -> Result<Visit, BillingError> {
        let row = fetch_visit_for_update(tx, *visit_id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("Visit", visit_id))?;
        Ok(row.into_visit()?)
    }
}

impl DomainPort for PgLedgerStore {}

/// Assembles the full ledger view inside the caller's transaction
pub(crate) async fn ledger_view_tx(
    tx: &mut Transaction<'_, Postgres>,
    visit_id: VisitId,
) -> Result<LedgerView, PortError> {
    let charge_rows = sqlx::query_as::<_, ChargeRow>(
        r#"
        SELECT charge_id, visit_id, department, description, amount,
               reverses, recorded_by, recorded_at
        FROM charges
        WHERE visit_id = $1
        ORDER BY seq
        "#,
    )
    .bind(visit_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_err)?;

    let payment_rows = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT payment_id, visit_id, amount, method, external_reference,
               receipt_number, recorded_by, recorded_at
        FROM payments
        WHERE visit_id = $1
        ORDER BY seq
        "#,
    )
    .bind(visit_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_err)?;

    let debit_rows = sqlx::query_as::<_, WalletDebitRow>(
        r#"
        SELECT transaction_id, visit_id, wallet_id, amount
        FROM wallet_transactions
        WHERE visit_id = $1 AND direction = 'DEBIT'
        ORDER BY seq
        "#,
    )
    .bind(visit_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_err)?;

    let insurance_row = sqlx::query_as::<_, InsuranceRow>(
        r#"
        SELECT insurance_id, visit_id, provider_name, policy_number,
               coverage_kind, coverage_value, status, attached_by, attached_at,
               approved_by, approved_at
        FROM insurance_claims
        WHERE visit_id = $1
        "#,
    )
    .bind(visit_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)?;

    let mut view = LedgerView::new(visit_id);
    for row in charge_rows {
        view.charges.push(row.into_charge()?);
    }
    for row in payment_rows {
        view.payments.push(row.into_payment()?);
    }
    view.wallet_debits = debit_rows.into_iter().map(WalletDebitRow::into_debit).collect();
    view.insurance = insurance_row.map(InsuranceRow::into_insurance).transpose()?;

    Ok(view)
}

async fn insert_charge(
    tx: &mut Transaction<'_, Postgres>,
    charge: &Charge,
) -> Result<(), PortError> {
    sqlx::query(
        r#"
        INSERT INTO charges (
            charge_id, visit_id, department, description, amount,
            reverses, recorded_by, recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(charge.id.as_uuid())
    .bind(charge.visit_id.as_uuid())
    .bind(charge.department.as_str())
    .bind(&charge.description)
    .bind(charge.amount.amount())
    .bind(charge.reverses.map(|c| *c.as_uuid()))
    .bind(charge.recorded_by.as_uuid())
    .bind(charge.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok(())
}

pub(crate) async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &Payment,
) -> Result<(), PortError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, visit_id, amount, method, external_reference,
            receipt_number, recorded_by, recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.visit_id.as_uuid())
    .bind(payment.amount.amount())
    .bind(payment.method.as_str())
    .bind(payment.external_reference.as_deref())
    .bind(&payment.receipt_number)
    .bind(payment.recorded_by.as_uuid())
    .bind(payment.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok(())
}

async fn insert_insurance(
    tx: &mut Transaction<'_, Postgres>,
    insurance: &Insurance,
) -> Result<(), PortError> {
    let (coverage_kind, coverage_value) = match insurance.coverage {
        Coverage::Amount(amount) => ("AMOUNT", amount.amount()),
        Coverage::Percent(rate) => ("PERCENT", rate.percent()),
    };

    sqlx::query(
        r#"
        INSERT INTO insurance_claims (
            insurance_id, visit_id, provider_name, policy_number,
            coverage_kind, coverage_value, status, attached_by, attached_at,
            approved_by, approved_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(insurance.id.as_uuid())
    .bind(insurance.visit_id.as_uuid())
    .bind(&insurance.provider_name)
    .bind(&insurance.policy_number)
    .bind(coverage_kind)
    .bind(coverage_value)
    .bind(insurance.status.as_str())
    .bind(insurance.attached_by.as_uuid())
    .bind(insurance.attached_at)
    .bind(insurance.approved_by.map(|s| *s.as_uuid()))
    .bind(insurance.approved_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok(())
}

fn wallet_error_for_debit(wallet_id: WalletId, error: WalletError) -> BillingError {
    match error {
        WalletError::InsufficientBalance {
            available,
            requested,
        } => BillingError::InsufficientWalletBalance {
            wallet_id,
            available,
            requested,
        },
        WalletError::AmountNotPositive { amount } => BillingError::AmountNotPositive { amount },
        WalletError::Storage(port) => BillingError::Storage(port),
        other => BillingError::validation(other.to_string()),
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self, actor), fields(patient_id = %patient_id))]
    async fn open_visit(
        &self,
        patient_id: PatientId,
        actor: &Actor,
    ) -> Result<Visit, BillingError> {
        let mut visit = Visit::open(patient_id, actor.staff_id());
        let events = visit.take_events();

        let opened_at = visit.created_at();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            r#"
            INSERT INTO visits (
                visit_id, visit_number, patient_id, state, payment_status,
                opened_by, opened_at, closed_at, closed_by, version,
                created_at, updated_at
            ) VALUES ($1, $2, $3, 'OPEN', $4, $5, $6, NULL, NULL, $7, $8, $9)
            "#,
        )
        .bind(visit.id().as_uuid())
        .bind(visit.visit_number())
        .bind(visit.patient_id().as_uuid())
        .bind(visit.payment_status().as_str())
        .bind(visit.opened_by().as_uuid())
        .bind(opened_at)
        .bind(visit.version() as i32)
        .bind(visit.created_at())
        .bind(visit.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::VisitOpened,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Visit, visit.id()),
            json!({ "visit_number": visit.visit_number() }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(visit_id = %visit.id(), visit_number = %visit.visit_number(), "visit opened");
        Ok(visit)
    }

    async fn visit(&self, visit_id: VisitId) -> Result<Visit, BillingError> {
        let row = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {} FROM visits WHERE visit_id = $1",
            VISIT_COLUMNS
        ))
        .bind(visit_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::not_found("Visit", visit_id))?;

        Ok(row.into_visit()?)
    }

    async fn visits_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<Visit>, BillingError> {
        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {} FROM visits WHERE patient_id = $1 ORDER BY created_at DESC",
            VISIT_COLUMNS
        ))
        .bind(patient_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut visits = Vec::with_capacity(rows.len());
        for row in rows {
            visits.push(row.into_visit()?);
        }
        Ok(visits)
    }

    #[instrument(skip(self, actor), fields(visit_id = %visit_id))]
    async fn close_visit(&self, visit_id: VisitId, actor: &Actor) -> Result<Visit, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, visit_id).await?;

        // The balance that decides closure is derived here, inside the
        // closing transaction. An earlier read does not count.
        let view = ledger_view_tx(&mut tx, visit_id).await?;
        let summary = self.engine.compute(&view)?;

        visit.close(actor.staff_id(), summary.outstanding)?;
        let events = visit.take_events();

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::VisitClosed,
            Some(visit_id),
            ResourceRef::new(AuditResource::Visit, visit_id),
            json!({
                "outstanding": summary.outstanding,
                "payment_status": visit.payment_status(),
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            visit_id = %visit_id,
            status = %visit.payment_status(),
            "visit closed"
        );
        Ok(visit)
    }

    async fn ledger_view(&self, visit_id: VisitId) -> Result<LedgerView, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        if fetch_visit(&mut tx, *visit_id.as_uuid()).await?.is_none() {
            return Err(PortError::not_found("Visit", visit_id).into());
        }
        let view = ledger_view_tx(&mut tx, visit_id).await?;

        tx.commit().await.map_err(storage_err)?;
        Ok(view)
    }

    async fn billing_summary(&self, visit_id: VisitId) -> Result<BillingSummary, BillingError> {
        let view = self.ledger_view(visit_id).await?;
        Ok(self.engine.compute(&view)?)
    }

    async fn events_for_visit(&self, visit_id: VisitId) -> Result<Vec<VisitEvent>, BillingError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT payload FROM visit_events WHERE visit_id = $1 ORDER BY seq",
        )
        .bind(visit_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row.into_event()?);
        }
        Ok(events)
    }

    #[instrument(skip(self, request, actor), fields(visit_id = %request.visit_id))]
    async fn record_charge(
        &self,
        request: RecordChargeRequest,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, request.visit_id).await?;
        visit.ensure_open()?;

        let charge = Charge::new(
            request.visit_id,
            request.department,
            request.description,
            request.amount,
            actor.staff_id(),
        )?;
        insert_charge(&mut tx, &charge).await?;

        let view = ledger_view_tx(&mut tx, request.visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let mut events = vec![VisitEvent::ChargeRecorded {
            visit_id: charge.visit_id,
            charge_id: charge.id,
            department: charge.department,
            amount: charge.amount,
            recorded_by: charge.recorded_by,
            timestamp: charge.recorded_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::ChargeRecorded,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Charge, charge.id),
            json!({
                "department": charge.department.as_str(),
                "amount": charge.amount,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(charge_id = %charge.id, amount = %charge.amount, "charge recorded");
        Ok(ChargeOutcome { charge, clearing })
    }

    #[instrument(skip(self, actor), fields(visit_id = %visit_id, charge_id = %charge_id))]
    async fn reverse_charge(
        &self,
        visit_id: VisitId,
        charge_id: ChargeId,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, visit_id).await?;
        visit.ensure_open()?;

        let original = sqlx::query_as::<_, ChargeRow>(
            r#"
            SELECT charge_id, visit_id, department, description, amount,
                   reverses, recorded_by, recorded_at
            FROM charges
            WHERE charge_id = $1 AND visit_id = $2
            "#,
        )
        .bind(charge_id.as_uuid())
        .bind(visit_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::not_found("Charge", charge_id))?
        .into_charge()?;

        let already_reversed =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM charges WHERE reverses = $1")
                .bind(charge_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_err)?;
        if already_reversed > 0 {
            return Err(BillingError::ChargeAlreadyReversed { charge_id });
        }

        let reversal = Charge::reversal_of(&original, actor.staff_id())?;
        insert_charge(&mut tx, &reversal).await?;

        let view = ledger_view_tx(&mut tx, visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let mut events = vec![VisitEvent::ChargeReversed {
            visit_id,
            charge_id: reversal.id,
            reverses: charge_id,
            amount: reversal.amount,
            recorded_by: reversal.recorded_by,
            timestamp: reversal.recorded_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::ChargeReversed,
            Some(visit_id),
            ResourceRef::new(AuditResource::Charge, reversal.id),
            json!({
                "reverses": charge_id.to_string(),
                "amount": reversal.amount,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(reversal_id = %reversal.id, "charge reversed");
        Ok(ChargeOutcome {
            charge: reversal,
            clearing,
        })
    }

    #[instrument(skip(self, request, actor), fields(visit_id = %request.visit_id))]
    async fn record_payment(
        &self,
        request: RecordPaymentRequest,
        actor: &Actor,
    ) -> Result<PaymentOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, request.visit_id).await?;
        visit.ensure_open()?;

        let payment = Payment::new(
            request.visit_id,
            request.amount,
            request.method,
            actor.staff_id(),
        )?;
        insert_payment(&mut tx, &payment).await?;

        let view = ledger_view_tx(&mut tx, request.visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let mut events = vec![VisitEvent::PaymentRecorded {
            visit_id: payment.visit_id,
            payment_id: payment.id,
            amount: payment.amount,
            method: payment.method,
            external_reference: payment.external_reference.clone(),
            recorded_by: payment.recorded_by,
            timestamp: payment.recorded_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::PaymentRecorded,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Payment, payment.id),
            json!({
                "amount": payment.amount,
                "method": payment.method,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            payment_id = %payment.id,
            amount = %payment.amount,
            method = %payment.method,
            status = %clearing.status_after,
            "payment recorded"
        );
        Ok(PaymentOutcome { payment, clearing })
    }

    #[instrument(skip(self, actor), fields(visit_id = %visit_id, wallet_id = %wallet_id))]
    async fn apply_wallet_debit(
        &self,
        visit_id: VisitId,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<WalletDebitOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Lock order is visit first, wallet second, everywhere.
        let mut visit = Self::locked_visit(&mut tx, visit_id).await?;
        visit.ensure_open()?;

        let mut wallet = fetch_wallet_for_update(&mut tx, *wallet_id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("Wallet", wallet_id))?
            .into_wallet();

        let transaction: WalletTransaction = wallet
            .debit_for_visit(visit_id, amount, actor.staff_id())
            .map_err(|e| wallet_error_for_debit(wallet_id, e))?;

        insert_wallet_transaction(&mut tx, &transaction).await?;
        update_wallet(&mut tx, &mut wallet).await?;

        let debit = WalletDebit {
            transaction_id: transaction.id,
            visit_id,
            wallet_id,
            amount: transaction.amount,
        };

        let view = ledger_view_tx(&mut tx, visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let mut events = vec![VisitEvent::WalletDebitApplied {
            visit_id,
            wallet_id,
            transaction_id: transaction.id,
            amount: transaction.amount,
            recorded_by: transaction.recorded_by,
            timestamp: transaction.recorded_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::WalletDebitApplied,
            Some(visit_id),
            ResourceRef::new(AuditResource::WalletTransaction, transaction.id),
            json!({
                "wallet_id": wallet_id.to_string(),
                "amount": transaction.amount,
                "balance_after": transaction.balance_after,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            balance_after = %wallet.balance(),
            "wallet debit applied"
        );
        Ok(WalletDebitOutcome {
            debit,
            balance_after: wallet.balance(),
            clearing,
        })
    }

    #[instrument(skip(self, request, actor), fields(visit_id = %request.visit_id))]
    async fn attach_insurance(
        &self,
        request: AttachInsuranceRequest,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, request.visit_id).await?;
        visit.ensure_open()?;

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM insurance_claims WHERE visit_id = $1")
                .bind(request.visit_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_err)?;
        if existing > 0 {
            return Err(BillingError::InsuranceAlreadyAttached {
                visit_id: request.visit_id,
            });
        }

        let insurance = Insurance::new(
            request.visit_id,
            request.provider_name,
            request.policy_number,
            request.coverage,
            actor.staff_id(),
        )?;
        insert_insurance(&mut tx, &insurance).await?;

        let view = ledger_view_tx(&mut tx, request.visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let mut events = vec![VisitEvent::InsuranceAttached {
            visit_id: insurance.visit_id,
            insurance_id: insurance.id,
            provider_name: insurance.provider_name.clone(),
            coverage: insurance.coverage,
            attached_by: insurance.attached_by,
            timestamp: insurance.attached_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::InsuranceAttached,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Insurance, insurance.id),
            json!({
                "provider_name": insurance.provider_name,
                "coverage": insurance.coverage,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(insurance_id = %insurance.id, "insurance attached");
        Ok(InsuranceOutcome {
            insurance,
            clearing,
        })
    }

    #[instrument(skip(self, actor), fields(visit_id = %visit_id))]
    async fn approve_insurance(
        &self,
        visit_id: VisitId,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut visit = Self::locked_visit(&mut tx, visit_id).await?;
        visit.ensure_open()?;

        let mut insurance = sqlx::query_as::<_, InsuranceRow>(
            r#"
            SELECT insurance_id, visit_id, provider_name, policy_number,
                   coverage_kind, coverage_value, status, attached_by, attached_at,
                   approved_by, approved_at
            FROM insurance_claims
            WHERE visit_id = $1
            "#,
        )
        .bind(visit_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or(BillingError::NoInsurance { visit_id })?
        .into_insurance()?;

        insurance.approve(actor.staff_id())?;

        sqlx::query(
            r#"
            UPDATE insurance_claims
            SET status = $2, approved_by = $3, approved_at = $4
            WHERE insurance_id = $1
            "#,
        )
        .bind(insurance.id.as_uuid())
        .bind(insurance.status.as_str())
        .bind(insurance.approved_by.map(|s| *s.as_uuid()))
        .bind(insurance.approved_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let view = ledger_view_tx(&mut tx, visit_id).await?;
        let clearing = self.clearing.run(&mut visit, &view)?;

        let approved_at = insurance.approved_at.unwrap_or(insurance.attached_at);
        let mut events = vec![VisitEvent::InsuranceApproved {
            visit_id,
            insurance_id: insurance.id,
            approved_by: actor.staff_id(),
            timestamp: approved_at,
        }];
        events.extend(visit.take_events());

        update_visit(&mut tx, &mut visit).await?;
        insert_visit_events(&mut tx, &events).await?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::InsuranceApproved,
            Some(visit_id),
            ResourceRef::new(AuditResource::Insurance, insurance.id),
            json!({
                "coverage": insurance.coverage,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            insurance_id = %insurance.id,
            status = %clearing.status_after,
            "insurance approved"
        );
        Ok(InsuranceOutcome {
            insurance,
            clearing,
        })
    }
}
