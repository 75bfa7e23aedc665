//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about; everything else gets
//! a plausible value.

use fake::faker::company::en::CompanyName;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ChargeId, Money, PatientId, Rate, VisitId};
use domain_billing::{
    AttachInsuranceRequest, Coverage, Department, LedgerStore, PaymentMethod,
    RecordChargeRequest, RecordPaymentRequest, Visit,
};
use domain_gateway::{compute_signature, WebhookEnvelope, WebhookStatus};
use domain_wallet::{Wallet, WalletStore};
use infra_db::InMemoryStore;

use crate::fixtures::{ActorFixtures, StringFixtures};

/// Builder for charge requests
pub struct ChargeRequestBuilder {
    visit_id: VisitId,
    department: Department,
    description: String,
    amount: Money,
}

impl ChargeRequestBuilder {
    /// Creates a builder for the given visit with consultation defaults
    pub fn new(visit_id: VisitId) -> Self {
        Self {
            visit_id,
            department: Department::Consultation,
            description: StringFixtures::charge_description().to_string(),
            amount: Money::new(dec!(5000.00)),
        }
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = department;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Money::new(amount);
        self
    }

    /// Uses a random generated description
    pub fn with_random_description(mut self) -> Self {
        self.description = Sentence(3..6).fake();
        self
    }

    pub fn build(self) -> RecordChargeRequest {
        RecordChargeRequest {
            visit_id: self.visit_id,
            department: self.department,
            description: self.description,
            amount: self.amount,
        }
    }
}

/// Builder for direct payment requests
pub struct PaymentRequestBuilder {
    visit_id: VisitId,
    amount: Money,
    method: PaymentMethod,
}

impl PaymentRequestBuilder {
    /// Creates a builder for the given visit with cash defaults
    pub fn new(visit_id: VisitId) -> Self {
        Self {
            visit_id,
            amount: Money::new(dec!(5000.00)),
            method: PaymentMethod::Cash,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Money::new(amount);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn build(self) -> RecordPaymentRequest {
        RecordPaymentRequest {
            visit_id: self.visit_id,
            amount: self.amount,
            method: self.method,
        }
    }
}

/// Builder for insurance attachment requests
pub struct InsuranceRequestBuilder {
    visit_id: VisitId,
    provider_name: String,
    policy_number: String,
    coverage: Coverage,
}

impl InsuranceRequestBuilder {
    /// Creates a builder for the given visit with standard amount coverage
    pub fn new(visit_id: VisitId) -> Self {
        Self {
            visit_id,
            provider_name: StringFixtures::provider_name().to_string(),
            policy_number: StringFixtures::policy_number().to_string(),
            coverage: Coverage::Amount(Money::new(dec!(10000.00))),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_name = provider.into();
        self
    }

    /// Uses a random generated provider name
    pub fn with_random_provider(mut self) -> Self {
        self.provider_name = CompanyName().fake();
        self
    }

    pub fn with_policy_number(mut self, number: impl Into<String>) -> Self {
        self.policy_number = number.into();
        self
    }

    /// Fixed amount coverage
    pub fn with_coverage(mut self, coverage: Decimal) -> Self {
        self.coverage = Coverage::Amount(Money::new(coverage));
        self
    }

    /// Percent-of-charges coverage
    ///
    /// # Panics
    ///
    /// Panics when the percentage lies outside 0..=100.
    pub fn with_percent_coverage(mut self, percent: Decimal) -> Self {
        self.coverage =
            Coverage::Percent(Rate::from_percent(percent).expect("valid coverage percent"));
        self
    }

    pub fn with_coverage_terms(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn build(self) -> AttachInsuranceRequest {
        AttachInsuranceRequest {
            visit_id: self.visit_id,
            provider_name: self.provider_name,
            policy_number: self.policy_number,
            coverage: self.coverage,
        }
    }
}

/// A webhook body with the signature the provider would send for it
pub struct SignedWebhook {
    pub body: Vec<u8>,
    pub signature: String,
}

/// Builder for signed webhook deliveries
///
/// Produces the raw body and matching HMAC header value, so handler
/// tests exercise the real verification path instead of stubbing it.
pub struct WebhookDeliveryBuilder {
    external_reference: String,
    amount: Decimal,
    status: WebhookStatus,
    reason: Option<String>,
}

impl WebhookDeliveryBuilder {
    /// A successful delivery for the given reference and amount
    pub fn success(external_reference: impl Into<String>, amount: Decimal) -> Self {
        Self {
            external_reference: external_reference.into(),
            amount,
            status: WebhookStatus::Success,
            reason: None,
        }
    }

    /// A failed delivery with the given provider reason
    pub fn failure(
        external_reference: impl Into<String>,
        amount: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            external_reference: external_reference.into(),
            amount,
            status: WebhookStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Serializes the body and signs it with the given secret
    ///
    /// # Panics
    ///
    /// Panics if serialization or signing fails.
    pub fn sign(self, secret: &str) -> SignedWebhook {
        let envelope = WebhookEnvelope {
            external_reference: self.external_reference,
            amount: self.amount,
            status: self.status,
            reason: self.reason,
        };
        let body = serde_json::to_vec(&envelope).expect("webhook body serializes");
        let signature = compute_signature(&body, secret).expect("webhook body signs");
        SignedWebhook { body, signature }
    }
}

/// A visit seeded into a store, with handles for assertions
pub struct SeededVisit {
    pub visit: Visit,
    pub patient_id: PatientId,
    pub charge_ids: Vec<ChargeId>,
    pub wallet: Option<Wallet>,
}

/// Builder that seeds a full visit scenario into an in-memory store
///
/// All setup mutations run as the admin fixture so capability checks
/// in the scenario under test stay isolated from the seeding.
pub struct VisitScenarioBuilder {
    patient_id: PatientId,
    charges: Vec<(Department, Decimal)>,
    payments: Vec<(PaymentMethod, Decimal)>,
    insurance: Option<(Coverage, bool)>,
    wallet_balance: Option<Decimal>,
}

impl VisitScenarioBuilder {
    pub fn new(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            charges: Vec::new(),
            payments: Vec::new(),
            insurance: None,
            wallet_balance: None,
        }
    }

    /// Adds a charge to record during seeding
    pub fn with_charge(mut self, department: Department, amount: Decimal) -> Self {
        self.charges.push((department, amount));
        self
    }

    /// Adds a direct payment to record during seeding
    pub fn with_payment(mut self, method: PaymentMethod, amount: Decimal) -> Self {
        self.payments.push((method, amount));
        self
    }

    /// Attaches insurance with the given amount coverage, optionally approved
    pub fn with_insurance(mut self, coverage: Decimal, approved: bool) -> Self {
        self.insurance = Some((Coverage::Amount(Money::new(coverage)), approved));
        self
    }

    /// Attaches insurance covering a percentage of charges
    ///
    /// # Panics
    ///
    /// Panics when the percentage lies outside 0..=100.
    pub fn with_percent_insurance(mut self, percent: Decimal, approved: bool) -> Self {
        let rate = Rate::from_percent(percent).expect("valid coverage percent");
        self.insurance = Some((Coverage::Percent(rate), approved));
        self
    }

    /// Opens a wallet for the patient and funds it
    pub fn with_funded_wallet(mut self, balance: Decimal) -> Self {
        self.wallet_balance = Some(balance);
        self
    }

    /// Seeds the scenario and returns handles to everything created
    ///
    /// # Panics
    ///
    /// Panics when any seeding step fails; a broken scenario should
    /// fail loudly before the test body runs.
    pub async fn seed(self, store: &InMemoryStore) -> SeededVisit {
        let admin = ActorFixtures::admin();

        let mut visit = store
            .open_visit(self.patient_id, &admin)
            .await
            .expect("seed: open visit");

        let mut charge_ids = Vec::new();
        for (department, amount) in self.charges {
            let outcome = store
                .record_charge(
                    ChargeRequestBuilder::new(visit.id())
                        .with_department(department)
                        .with_amount(amount)
                        .build(),
                    &admin,
                )
                .await
                .expect("seed: record charge");
            charge_ids.push(outcome.charge.id);
        }

        if let Some((coverage, approved)) = self.insurance {
            store
                .attach_insurance(
                    InsuranceRequestBuilder::new(visit.id())
                        .with_coverage_terms(coverage)
                        .build(),
                    &admin,
                )
                .await
                .expect("seed: attach insurance");
            if approved {
                store
                    .approve_insurance(visit.id(), &admin)
                    .await
                    .expect("seed: approve insurance");
            }
        }

        for (method, amount) in self.payments {
            store
                .record_payment(
                    PaymentRequestBuilder::new(visit.id())
                        .with_method(method)
                        .with_amount(amount)
                        .build(),
                    &admin,
                )
                .await
                .expect("seed: record payment");
        }

        let wallet = match self.wallet_balance {
            Some(balance) => {
                let wallet = store
                    .open_wallet(self.patient_id, &admin)
                    .await
                    .expect("seed: open wallet");
                let outcome = store
                    .credit(wallet.id(), Money::new(balance), &admin)
                    .await
                    .expect("seed: credit wallet");
                Some(outcome.wallet)
            }
            None => None,
        };

        // Reload so the caller sees the stored state after clearing
        visit = store.visit(visit.id()).await.expect("seed: reload visit");

        SeededVisit {
            visit,
            patient_id: self.patient_id,
            charge_ids,
            wallet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::IdFixtures;
    use domain_billing::PaymentStatus;

    #[tokio::test]
    async fn test_scenario_seeds_charges_and_payments() {
        let store = InMemoryStore::new();
        let seeded = VisitScenarioBuilder::new(IdFixtures::patient_id())
            .with_charge(Department::Consultation, dec!(5000))
            .with_payment(PaymentMethod::Cash, dec!(5000))
            .seed(&store)
            .await;

        assert_eq!(seeded.charge_ids.len(), 1);
        assert_eq!(seeded.visit.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_charge_builder_defaults() {
        let request = ChargeRequestBuilder::new(IdFixtures::unknown_visit_id()).build();
        assert_eq!(request.department, Department::Consultation);
        assert!(request.amount.is_positive());
        assert!(!request.description.is_empty());
    }

    #[test]
    fn test_signed_webhook_verifies_and_parses() {
        let secret = StringFixtures::webhook_secret();
        let delivery = WebhookDeliveryBuilder::success("gw_1a2b3c4d", dec!(1500.00)).sign(secret);

        domain_gateway::verify_signature(&delivery.body, &delivery.signature, secret)
            .expect("signature should verify with the signing secret");
        let envelope = domain_gateway::parse_envelope(&delivery.body).unwrap();
        assert_eq!(envelope.external_reference, "gw_1a2b3c4d");
        assert_eq!(envelope.status, WebhookStatus::Success);
    }
}
