//! In-memory storage for tests and local development
//!
//! One store implements every port so a composed application can run
//! without PostgreSQL. A single mutex stands in for the per-row locks
//! of the real adapters: each call validates against current state,
//! runs the clearing pass, and only then writes, so a failed call
//! leaves no partial records behind. `attempt_update_record` and
//! `attempt_delete_record` model the append-only triggers by refusing
//! to touch any stored record.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use core_kernel::{
    Actor, ChargeId, DomainPort, Money, PatientId, PaymentIntentId, PortError, RecordKind,
    VisitId, WalletId,
};
use domain_audit::{
    AuditAction, AuditError, AuditLogEntry, AuditPage, AuditResource, AuditSink, ResourceRef,
};
use domain_billing::{
    AttachInsuranceRequest, BillingEngine, BillingError, BillingSummary, Charge, ChargeOutcome,
    ClearingService, Insurance, InsuranceOutcome, LedgerStore, LedgerView, Payment,
    PaymentOutcome, RecordChargeRequest, RecordPaymentRequest, Visit, VisitEvent, WalletDebit,
    WalletDebitOutcome,
};
use domain_gateway::{
    GatewayError, GatewayStore, PaymentIntent, SettlementOutcome, VerificationMarker,
};
use domain_wallet::{CreditOutcome, Wallet, WalletError, WalletStore, WalletTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    visits: HashMap<VisitId, Visit>,
    charges: Vec<Charge>,
    payments: Vec<Payment>,
    insurance: HashMap<VisitId, Insurance>,
    wallets: HashMap<WalletId, Wallet>,
    wallet_txns: Vec<WalletTransaction>,
    intents: HashMap<PaymentIntentId, PaymentIntent>,
    markers: HashMap<String, VerificationMarker>,
    events: Vec<VisitEvent>,
    audit: Vec<AuditLogEntry>,
}

impl MemoryState {
    fn visit(&self, visit_id: VisitId) -> Result<Visit, PortError> {
        self.visits
            .get(&visit_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Visit", visit_id))
    }

    fn view_for(&self, visit_id: VisitId) -> LedgerView {
        let mut view = LedgerView::new(visit_id);
        view.charges = self
            .charges
            .iter()
            .filter(|c| c.visit_id == visit_id)
            .cloned()
            .collect();
        view.payments = self
            .payments
            .iter()
            .filter(|p| p.visit_id == visit_id)
            .cloned()
            .collect();
        view.wallet_debits = self
            .wallet_txns
            .iter()
            .filter(|t| t.is_visit_settlement() && t.visit_id == Some(visit_id))
            .map(|t| WalletDebit {
                transaction_id: t.id,
                visit_id,
                wallet_id: t.wallet_id,
                amount: t.amount,
            })
            .collect();
        view.insurance = self.insurance.get(&visit_id).cloned();
        view
    }
}

/// In-memory implementation of every storage port
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    clearing: ClearingService,
    engine: BillingEngine,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, MemoryState>, PortError> {
        self.state
            .lock()
            .map_err(|_| PortError::internal("memory store lock poisoned"))
    }

    /// Attempts an in-place update of a stored record, which always fails
    ///
    /// Mirrors the database triggers: a record that exists cannot be
    /// updated, only compensated. Exposed so tests can prove the refusal
    /// for every record kind.
    pub fn attempt_update_record(&self, kind: RecordKind, id: Uuid) -> Result<(), PortError> {
        self.refuse_mutation(kind, id)
    }

    /// Attempts to delete a stored record, which always fails
    pub fn attempt_delete_record(&self, kind: RecordKind, id: Uuid) -> Result<(), PortError> {
        self.refuse_mutation(kind, id)
    }

    fn refuse_mutation(&self, kind: RecordKind, id: Uuid) -> Result<(), PortError> {
        let state = self.locked()?;
        let exists = match kind {
            RecordKind::Charge => state.charges.iter().any(|c| c.id.as_uuid() == &id),
            RecordKind::Payment => state.payments.iter().any(|p| p.id.as_uuid() == &id),
            RecordKind::WalletTransaction => {
                state.wallet_txns.iter().any(|t| t.id.as_uuid() == &id)
            }
            RecordKind::AuditEntry => state.audit.iter().any(|e| e.id.as_uuid() == &id),
        };
        if exists {
            return Err(PortError::immutable_record(kind, id));
        }
        Err(PortError::not_found(kind.to_string(), id))
    }
}

impl DomainPort for InMemoryStore {}

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
impl LedgerStore for InMemoryStore {
    async fn open_visit(
        &self,
        patient_id: PatientId,
        actor: &Actor,
    ) -> Result<Visit, BillingError> {
        let mut state = self.locked()?;

        let mut visit = Visit::open(patient_id, actor.staff_id());
        let events = visit.take_events();

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::VisitOpened,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Visit, visit.id()),
            json!({ "visit_number": visit.visit_number() }),
        ));
        state.events.extend(events);
        state.visits.insert(visit.id(), visit.clone());

        Ok(visit)
    }

    async fn visit(&self, visit_id: VisitId) -> Result<Visit, BillingError> {
        Ok(self.locked()?.visit(visit_id)?)
    }

    async fn visits_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<Visit>, BillingError> {
        let state = self.locked()?;
        let mut visits: Vec<Visit> = state
            .visits
            .values()
            .filter(|v| v.patient_id() == patient_id)
            .cloned()
            .collect();
        visits.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(visits)
    }

    async fn close_visit(&self, visit_id: VisitId, actor: &Actor) -> Result<Visit, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(visit_id)?;
        let view = state.view_for(visit_id);
        let summary = self.engine.compute(&view)?;

        visit.close(actor.staff_id(), summary.outstanding)?;
        let events = visit.take_events();

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::VisitClosed,
            Some(visit_id),
            ResourceRef::new(AuditResource::Visit, visit_id),
            json!({
                "outstanding": summary.outstanding,
                "payment_status": visit.payment_status(),
            }),
        ));
        state.events.extend(events);
        state.visits.insert(visit_id, visit.clone());

        Ok(visit)
    }

    async fn ledger_view(&self, visit_id: VisitId) -> Result<LedgerView, BillingError> {
        let state = self.locked()?;
        state.visit(visit_id)?;
        Ok(state.view_for(visit_id))
    }

    async fn billing_summary(&self, visit_id: VisitId) -> Result<BillingSummary, BillingError> {
        let state = self.locked()?;
        state.visit(visit_id)?;
        Ok(self.engine.compute(&state.view_for(visit_id))?)
    }

    async fn events_for_visit(&self, visit_id: VisitId) -> Result<Vec<VisitEvent>, BillingError> {
        let state = self.locked()?;
        state.visit(visit_id)?;
        Ok(state
            .events
            .iter()
            .filter(|e| e.visit_id() == visit_id)
            .cloned()
            .collect())
    }

    async fn record_charge(
        &self,
        request: RecordChargeRequest,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(request.visit_id)?;
        visit.ensure_open()?;

        let charge = Charge::new(
            request.visit_id,
            request.department,
            request.description,
            request.amount,
            actor.staff_id(),
        )?;

        let mut view = state.view_for(request.visit_id);
        view.charges.push(charge.clone());
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

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::ChargeRecorded,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Charge, charge.id),
            json!({
                "department": charge.department.as_str(),
                "amount": charge.amount,
                "status_after": clearing.status_after,
            }),
        ));
        state.charges.push(charge.clone());
        state.events.extend(events);
        state.visits.insert(visit.id(), visit);

        Ok(ChargeOutcome { charge, clearing })
    }

    async fn reverse_charge(
        &self,
        visit_id: VisitId,
        charge_id: ChargeId,
        actor: &Actor,
    ) -> Result<ChargeOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(visit_id)?;
        visit.ensure_open()?;

        let original = state
            .charges
            .iter()
            .find(|c| c.id == charge_id && c.visit_id == visit_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Charge", charge_id))?;

        if state.charges.iter().any(|c| c.reverses == Some(charge_id)) {
            return Err(BillingError::ChargeAlreadyReversed { charge_id });
        }

        let reversal = Charge::reversal_of(&original, actor.staff_id())?;

        let mut view = state.view_for(visit_id);
        view.charges.push(reversal.clone());
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

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::ChargeReversed,
            Some(visit_id),
            ResourceRef::new(AuditResource::Charge, reversal.id),
            json!({
                "reverses": charge_id.to_string(),
                "amount": reversal.amount,
            }),
        ));
        state.charges.push(reversal.clone());
        state.events.extend(events);
        state.visits.insert(visit_id, visit);

        Ok(ChargeOutcome {
            charge: reversal,
            clearing,
        })
    }

    async fn record_payment(
        &self,
        request: RecordPaymentRequest,
        actor: &Actor,
    ) -> Result<PaymentOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(request.visit_id)?;
        visit.ensure_open()?;

        let payment = Payment::new(
            request.visit_id,
            request.amount,
            request.method,
            actor.staff_id(),
        )?;

        let mut view = state.view_for(request.visit_id);
        view.payments.push(payment.clone());
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

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::PaymentRecorded,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Payment, payment.id),
            json!({
                "amount": payment.amount,
                "method": payment.method,
                "status_after": clearing.status_after,
            }),
        ));
        state.payments.push(payment.clone());
        state.events.extend(events);
        state.visits.insert(visit.id(), visit);

        Ok(PaymentOutcome { payment, clearing })
    }

    async fn apply_wallet_debit(
        &self,
        visit_id: VisitId,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<WalletDebitOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(visit_id)?;
        visit.ensure_open()?;

        let mut wallet = state
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Wallet", wallet_id))?;

        let transaction = wallet
            .debit_for_visit(visit_id, amount, actor.staff_id())
            .map_err(|e| wallet_error_for_debit(wallet_id, e))?;
        wallet.bump_version();

        let debit = WalletDebit {
            transaction_id: transaction.id,
            visit_id,
            wallet_id,
            amount: transaction.amount,
        };

        let mut view = state.view_for(visit_id);
        view.wallet_debits.push(debit.clone());
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

        state.audit.push(AuditLogEntry::record(
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
        ));
        let balance_after = wallet.balance();
        state.wallet_txns.push(transaction);
        state.wallets.insert(wallet_id, wallet);
        state.events.extend(events);
        state.visits.insert(visit_id, visit);

        Ok(WalletDebitOutcome {
            debit,
            balance_after,
            clearing,
        })
    }

    async fn attach_insurance(
        &self,
        request: AttachInsuranceRequest,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(request.visit_id)?;
        visit.ensure_open()?;

        if state.insurance.contains_key(&request.visit_id) {
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

        let mut view = state.view_for(request.visit_id);
        view.insurance = Some(insurance.clone());
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

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::InsuranceAttached,
            Some(visit.id()),
            ResourceRef::new(AuditResource::Insurance, insurance.id),
            json!({
                "provider_name": insurance.provider_name,
                "coverage": insurance.coverage,
                "status_after": clearing.status_after,
            }),
        ));
        state.insurance.insert(insurance.visit_id, insurance.clone());
        state.events.extend(events);
        state.visits.insert(visit.id(), visit);

        Ok(InsuranceOutcome {
            insurance,
            clearing,
        })
    }

    async fn approve_insurance(
        &self,
        visit_id: VisitId,
        actor: &Actor,
    ) -> Result<InsuranceOutcome, BillingError> {
        let mut state = self.locked()?;

        let mut visit = state.visit(visit_id)?;
        visit.ensure_open()?;

        let mut insurance = state
            .insurance
            .get(&visit_id)
            .cloned()
            .ok_or(BillingError::NoInsurance { visit_id })?;

        insurance.approve(actor.staff_id())?;

        let mut view = state.view_for(visit_id);
        view.insurance = Some(insurance.clone());
        let clearing = self.clearing.run(&mut visit, &view)?;

        let approved_at = insurance.approved_at.unwrap_or(insurance.attached_at);
        let mut events = vec![VisitEvent::InsuranceApproved {
            visit_id,
            insurance_id: insurance.id,
            approved_by: actor.staff_id(),
            timestamp: approved_at,
        }];
        events.extend(visit.take_events());

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::InsuranceApproved,
            Some(visit_id),
            ResourceRef::new(AuditResource::Insurance, insurance.id),
            json!({
                "coverage": insurance.coverage,
                "status_after": clearing.status_after,
            }),
        ));
        state.insurance.insert(visit_id, insurance.clone());
        state.events.extend(events);
        state.visits.insert(visit_id, visit);

        Ok(InsuranceOutcome {
            insurance,
            clearing,
        })
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn open_wallet(
        &self,
        patient_id: PatientId,
        actor: &Actor,
    ) -> Result<Wallet, WalletError> {
        let mut state = self.locked()?;

        if state.wallets.values().any(|w| w.patient_id() == patient_id) {
            return Err(PortError::conflict(format!(
                "patient {} already has a wallet",
                patient_id
            ))
            .into());
        }

        let wallet = Wallet::open(patient_id);

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::WalletOpened,
            None,
            ResourceRef::new(AuditResource::Wallet, wallet.id()),
            json!({ "patient_id": patient_id.to_string() }),
        ));
        state.wallets.insert(wallet.id(), wallet.clone());

        Ok(wallet)
    }

    async fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, WalletError> {
        let state = self.locked()?;
        state
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Wallet", wallet_id).into())
    }

    async fn wallet_for_patient(&self, patient_id: PatientId) -> Result<Wallet, WalletError> {
        let state = self.locked()?;
        state
            .wallets
            .values()
            .find(|w| w.patient_id() == patient_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Wallet", patient_id).into())
    }

    async fn credit(
        &self,
        wallet_id: WalletId,
        amount: Money,
        actor: &Actor,
    ) -> Result<CreditOutcome, WalletError> {
        let mut state = self.locked()?;

        let mut wallet = state
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Wallet", wallet_id))?;

        let transaction = wallet.credit(amount, actor.staff_id())?;
        wallet.bump_version();

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::WalletCredited,
            None,
            ResourceRef::new(AuditResource::WalletTransaction, transaction.id),
            json!({
                "wallet_id": wallet_id.to_string(),
                "amount": transaction.amount,
                "balance_after": transaction.balance_after,
            }),
        ));
        state.wallet_txns.push(transaction.clone());
        state.wallets.insert(wallet_id, wallet.clone());

        Ok(CreditOutcome {
            wallet,
            transaction,
        })
    }

    async fn transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let state = self.locked()?;
        Ok(state
            .wallet_txns
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GatewayStore for InMemoryStore {
    async fn create_intent(
        &self,
        visit_id: VisitId,
        amount: Money,
        provider: &str,
        actor: &Actor,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.locked()?;

        let visit = state.visit(visit_id)?;
        if visit.is_closed() {
            return Err(GatewayError::Storage(PortError::conflict(format!(
                "visit {} is closed",
                visit_id
            ))));
        }

        let intent = PaymentIntent::new(visit_id, amount, provider, actor.staff_id())?;

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::GatewayIntentCreated,
            Some(visit_id),
            ResourceRef::new(AuditResource::PaymentIntent, intent.id),
            json!({
                "provider": intent.provider,
                "amount": intent.amount,
                "external_reference": intent.external_reference,
            }),
        ));
        state.intents.insert(intent.id, intent.clone());

        Ok(intent)
    }

    async fn intent(&self, intent_id: PaymentIntentId) -> Result<PaymentIntent, GatewayError> {
        let state = self.locked()?;
        state
            .intents
            .get(&intent_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("PaymentIntent", intent_id).into())
    }

    async fn intent_by_reference(&self, reference: &str) -> Result<PaymentIntent, GatewayError> {
        let state = self.locked()?;
        state
            .intents
            .values()
            .find(|i| i.external_reference == reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference {
                reference: reference.to_string(),
            })
    }

    async fn verification_marker(
        &self,
        reference: &str,
    ) -> Result<Option<VerificationMarker>, GatewayError> {
        let state = self.locked()?;
        Ok(state.markers.get(reference).cloned())
    }

    async fn begin_verification(&self, reference: &str) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.locked()?;

        let mut intent = state
            .intents
            .values()
            .find(|i| i.external_reference == reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference {
                reference: reference.to_string(),
            })?;

        intent.begin_verification()?;
        state.intents.insert(intent.id, intent.clone());

        Ok(intent)
    }

    async fn settle_verified(
        &self,
        reference: &str,
        actor: &Actor,
    ) -> Result<SettlementOutcome, GatewayError> {
        let mut state = self.locked()?;

        let mut intent = state
            .intents
            .values()
            .find(|i| i.external_reference == reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference {
                reference: reference.to_string(),
            })?;

        if state.markers.contains_key(reference) {
            return Err(GatewayError::Storage(PortError::conflict(format!(
                "reference {} is already settled",
                reference
            ))));
        }

        let mut visit = state.visit(intent.visit_id)?;
        if visit.is_closed() {
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

        let marker = VerificationMarker {
            external_reference: reference.to_string(),
            payment_id: payment.id,
            verified_at: Utc::now(),
        };

        let mut view = state.view_for(intent.visit_id);
        view.payments.push(payment.clone());
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

        state.audit.push(AuditLogEntry::record(
            actor,
            AuditAction::GatewayPaymentVerified,
            Some(intent.visit_id),
            ResourceRef::new(AuditResource::Payment, payment.id),
            json!({
                "external_reference": reference,
                "amount": payment.amount,
                "status_after": clearing.status_after,
            }),
        ));
        let payment_id = payment.id;
        state.payments.push(payment);
        state.markers.insert(reference.to_string(), marker);
        state.intents.insert(intent.id, intent.clone());
        state.events.extend(events);
        state.visits.insert(visit.id(), visit);

        Ok(SettlementOutcome { intent, payment_id })
    }

    async fn record_failure(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.locked()?;

        let mut intent = state
            .intents
            .values()
            .find(|i| i.external_reference == reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference {
                reference: reference.to_string(),
            })?;

        intent.fail(reason)?;

        let reconciler = Actor::gateway_reconciler();
        state.audit.push(AuditLogEntry::record(
            &reconciler,
            AuditAction::GatewayPaymentFailed,
            Some(intent.visit_id),
            ResourceRef::new(AuditResource::PaymentIntent, intent.id),
            json!({
                "external_reference": reference,
                "reason": reason,
            }),
        ));
        state.intents.insert(intent.id, intent.clone());

        Ok(intent)
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, AuditError> {
        let mut state = self.locked()?;
        state.audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_for_visit(
        &self,
        visit_id: VisitId,
        page: AuditPage,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let state = self.locked()?;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|e| e.visit_id == Some(visit_id))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}
