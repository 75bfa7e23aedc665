//! PostgreSQL gateway store
//!
//! Intents move through their lifecycle with plain row updates; the
//! settlement path is the one place money enters the ledger from here,
//! and it writes the verification marker, the payment, the clearing
//! result and the intent state in a single transaction. Lock order is
//! intent first, visit second.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use core_kernel::{Actor, DomainPort, Money, PaymentIntentId, PortError, VisitId};
use domain_audit::{AuditAction, AuditLogEntry, AuditResource, ResourceRef};
use domain_billing::{BillingError, ClearingService, Payment, VisitEvent};
use domain_gateway::{
    GatewayError, GatewayStore, PaymentIntent, SettlementOutcome, VerificationMarker,
};

use super::ledger::insert_payment;
use super::rows::{
    fetch_visit, fetch_visit_for_update, insert_audit_entry, insert_visit_events, update_visit,
    IntentRow, MarkerRow,
};
use super::storage_err;

const INTENT_COLUMNS: &str = "intent_id, visit_id, amount, provider, external_reference, \
     state, failure_reason, created_by, created_at, updated_at";

/// PostgreSQL implementation of the gateway port
#[derive(Debug, Clone)]
pub struct PgGatewayStore {
    pool: PgPool,
    clearing: ClearingService,
}

impl PgGatewayStore {
    /// Creates a new gateway store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clearing: ClearingService::new(),
        }
    }

    async fn locked_intent(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE external_reference = $1 FOR UPDATE",
            INTENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| GatewayError::UnknownReference {
            reference: reference.to_string(),
        })?;

        Ok(row.into_intent()?)
    }

    async fn update_intent(
        tx: &mut Transaction<'_, Postgres>,
        intent: &PaymentIntent,
    ) -> Result<(), PortError> {
        sqlx::query(
            r#"
            UPDATE payment_intents
            SET state = $2, failure_reason = $3, updated_at = $4
            WHERE intent_id = $1
            "#,
        )
        .bind(intent.id.as_uuid())
        .bind(intent.state.as_str())
        .bind(intent.failure_reason.as_deref())
        .bind(intent.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

impl DomainPort for PgGatewayStore {}

/// Maps ledger-side failures into the gateway's error vocabulary
///
/// Storage faults pass through untouched so transience and conflict
/// kinds survive; domain rejections become validation errors because,
/// seen from the gateway, the settlement input was unacceptable.
fn settlement_err(error: BillingError) -> GatewayError {
    match error {
        BillingError::Storage(port) => GatewayError::Storage(port),
        other if other.is_conflict() => {
            GatewayError::Storage(PortError::conflict(other.to_string()))
        }
        other => GatewayError::validation(other.to_string()),
    }
}

#[async_trait]
impl GatewayStore for PgGatewayStore {
    #[instrument(skip(self, actor), fields(visit_id = %visit_id, amount = %amount))]
    async fn create_intent(
        &self,
        visit_id: VisitId,
        amount: Money,
        provider: &str,
        actor: &Actor,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let visit = fetch_visit(&mut tx, *visit_id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("Visit", visit_id))?
            .into_visit()?;
        if visit.is_closed() {
            return Err(GatewayError::Storage(PortError::conflict(format!(
                "visit {} is closed",
                visit_id
            ))));
        }

        let intent = PaymentIntent::new(visit_id, amount, provider, actor.staff_id())?;

        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                intent_id, visit_id, amount, provider, external_reference,
                state, failure_reason, created_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(intent.id.as_uuid())
        .bind(intent.visit_id.as_uuid())
        .bind(intent.amount.amount())
        .bind(&intent.provider)
        .bind(&intent.external_reference)
        .bind(intent.state.as_str())
        .bind(intent.failure_reason.as_deref())
        .bind(intent.created_by.as_uuid())
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let entry = AuditLogEntry::record(
            actor,
            AuditAction::GatewayIntentCreated,
            Some(visit_id),
            ResourceRef::new(AuditResource::PaymentIntent, intent.id),
            json!({
                "provider": intent.provider,
                "amount": intent.amount,
                "external_reference": intent.external_reference,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            intent_id = %intent.id,
            reference = %intent.external_reference,
            "payment intent created"
        );
        Ok(intent)
    }

    async fn intent(&self, intent_id: PaymentIntentId) -> Result<PaymentIntent, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE intent_id = $1",
            INTENT_COLUMNS
        ))
        .bind(intent_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::not_found("PaymentIntent", intent_id))?;

        Ok(row.into_intent()?)
    }

    async fn intent_by_reference(&self, reference: &str) -> Result<PaymentIntent, GatewayError> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE external_reference = $1",
            INTENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| GatewayError::UnknownReference {
            reference: reference.to_string(),
        })?;

        Ok(row.into_intent()?)
    }

    async fn verification_marker(
        &self,
        reference: &str,
    ) -> Result<Option<VerificationMarker>, GatewayError> {
        let row = sqlx::query_as::<_, MarkerRow>(
            r#"
            SELECT external_reference, payment_id, verified_at
            FROM verification_markers
            WHERE external_reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(MarkerRow::into_marker))
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn begin_verification(&self, reference: &str) -> Result<PaymentIntent, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut intent = Self::locked_intent(&mut tx, reference).await?;
        intent.begin_verification()?;

        Self::update_intent(&mut tx, &intent).await?;
        tx.commit().await.map_err(storage_err)?;

        tracing::info!(intent_id = %intent.id, "verification started");
        Ok(intent)
    }

    #[instrument(skip(self, actor), fields(reference = %reference))]
    async fn settle_verified(
        &self,
        reference: &str,
        actor: &Actor,
    ) -> Result<SettlementOutcome, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut intent = Self::locked_intent(&mut tx, reference).await?;

        let marker_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM verification_markers WHERE external_reference = $1",
        )
        .bind(reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;
        if marker_exists > 0 {
            return Err(GatewayError::Storage(PortError::conflict(format!(
                "reference {} is already settled",
                reference
            ))));
        }

        let mut visit = fetch_visit_for_update(&mut tx, *intent.visit_id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("Visit", intent.visit_id))?
            .into_visit()?;
        if visit.is_closed() {
            // Roll back and leave the intent VERIFYING for operator
            // follow-up; money confirmed against a closed visit cannot
            // be applied automatically.
            return Err(GatewayError::Storage(PortError::conflict(format!(
                "visit {} is closed, settlement for {} needs manual review",
                intent.visit_id, reference
            ))));
        }

        intent.mark_verified()?;
        intent.settle()?;

        let payment = Payment::from_gateway(
            intent.visit_id,
            intent.amount,
            intent.external_reference.clone(),
            actor.staff_id(),
        )
        .map_err(settlement_err)?;
        insert_payment(&mut tx, &payment).await?;

        let marker = VerificationMarker {
            external_reference: reference.to_string(),
            payment_id: payment.id,
            verified_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO verification_markers (external_reference, payment_id, verified_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&marker.external_reference)
        .bind(marker.payment_id.as_uuid())
        .bind(marker.verified_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        Self::update_intent(&mut tx, &intent).await?;

        let view = super::ledger::ledger_view_tx(&mut tx, intent.visit_id).await?;
        let clearing = self
            .clearing
            .run(&mut visit, &view)
            .map_err(settlement_err)?;

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
            AuditAction::GatewayPaymentVerified,
            Some(intent.visit_id),
            ResourceRef::new(AuditResource::Payment, payment.id),
            json!({
                "external_reference": reference,
                "amount": payment.amount,
                "status_after": clearing.status_after,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::info!(
            intent_id = %intent.id,
            payment_id = %payment.id,
            status = %clearing.status_after,
            "gateway payment settled"
        );
        Ok(SettlementOutcome {
            intent,
            payment_id: payment.id,
        })
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn record_failure(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let mut intent = Self::locked_intent(&mut tx, reference).await?;
        intent.fail(reason)?;

        Self::update_intent(&mut tx, &intent).await?;

        let reconciler = Actor::gateway_reconciler();
        let entry = AuditLogEntry::record(
            &reconciler,
            AuditAction::GatewayPaymentFailed,
            Some(intent.visit_id),
            ResourceRef::new(AuditResource::PaymentIntent, intent.id),
            json!({
                "external_reference": reference,
                "reason": reason,
            }),
        );
        insert_audit_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage_err)?;

        tracing::warn!(intent_id = %intent.id, reason = %reason, "gateway payment failed");
        Ok(intent)
    }
}
