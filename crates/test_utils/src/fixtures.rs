//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the visit billing suite. Amounts and
//! identities are deterministic so assertions can use exact values.

use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{
    Actor, Capability, CapabilitySet, Money, PatientId, StaffId, VisitId, WalletId,
};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Standard consultation fee
    pub fn consultation_fee() -> Money {
        Money::new(dec!(5000.00))
    }

    /// Standard laboratory panel fee
    pub fn lab_fee() -> Money {
        Money::new(dec!(12500.00))
    }

    /// Standard pharmacy dispense fee
    pub fn pharmacy_fee() -> Money {
        Money::new(dec!(8750.00))
    }

    /// Large admission deposit
    pub fn admission_fee() -> Money {
        Money::new(dec!(40000.00))
    }

    /// Typical wallet top-up
    pub fn top_up() -> Money {
        Money::new(dec!(50000.00))
    }

    /// Small amount for partial-payment scenarios
    pub fn small_payment() -> Money {
        Money::new(dec!(500.00))
    }

    /// Zero amount
    pub fn zero() -> Money {
        Money::zero()
    }
}

/// Fixture for staff actors in their usual roles
pub struct ActorFixtures;

impl ActorFixtures {
    /// An administrator holding every capability
    pub fn admin() -> Actor {
        Actor::new(
            IdFixtures::admin_staff_id(),
            "admin",
            Capability::all().into_iter().collect(),
        )
    }

    /// A front desk officer who opens visits and raises charges
    pub fn front_desk() -> Actor {
        Actor::new(
            IdFixtures::staff_id(1),
            "front-desk",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::RecordCharge),
        )
    }

    /// A cashier who collects money in every form
    pub fn cashier() -> Actor {
        Actor::new(
            IdFixtures::staff_id(2),
            "cashier",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::CollectPayment)
                .grant(Capability::TopUpWallet)
                .grant(Capability::DebitWallet),
        )
    }

    /// A billing clerk who manages the ledger and closes visits
    pub fn billing_clerk() -> Actor {
        Actor::new(
            IdFixtures::staff_id(3),
            "billing-clerk",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::RecordCharge)
                .grant(Capability::CloseVisit),
        )
    }

    /// An insurance desk officer
    pub fn insurance_officer() -> Actor {
        Actor::new(
            IdFixtures::staff_id(4),
            "insurance-officer",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::AttachInsurance)
                .grant(Capability::ApproveInsurance),
        )
    }

    /// A doctor who performs clinical actions but handles no money
    pub fn doctor() -> Actor {
        Actor::new(
            IdFixtures::staff_id(5),
            "doctor",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::PerformClinicalAction),
        )
    }

    /// An auditor with read-only access to the trail
    pub fn auditor() -> Actor {
        Actor::new(
            IdFixtures::staff_id(6),
            "auditor",
            CapabilitySet::new()
                .grant(Capability::ViewBilling)
                .grant(Capability::ViewAuditTrail),
        )
    }

    /// An actor with no capabilities at all
    pub fn intruder() -> Actor {
        Actor::new(IdFixtures::staff_id(9), "unknown", CapabilitySet::new())
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Deterministic admin staff ID
    pub fn admin_staff_id() -> StaffId {
        StaffId::from_uuid(Uuid::from_u128(0xA11CE000_0000_7000_8000_000000000000))
    }

    /// Deterministic staff ID, distinct per index
    pub fn staff_id(index: u8) -> StaffId {
        StaffId::from_uuid(Uuid::from_u128(
            0x57AFF000_0000_7000_8000_000000000000 + index as u128,
        ))
    }

    /// Deterministic patient ID
    pub fn patient_id() -> PatientId {
        PatientId::from_uuid(Uuid::from_u128(0x9A71E247_0000_7000_8000_000000000001))
    }

    /// Deterministic second patient for isolation tests
    pub fn other_patient_id() -> PatientId {
        PatientId::from_uuid(Uuid::from_u128(0x9A71E247_0000_7000_8000_000000000002))
    }

    /// A visit ID that exists in no store
    pub fn unknown_visit_id() -> VisitId {
        VisitId::from_uuid(Uuid::from_u128(0xDEAD0000_0000_7000_8000_000000000000))
    }

    /// A wallet ID that exists in no store
    pub fn unknown_wallet_id() -> WalletId {
        WalletId::from_uuid(Uuid::from_u128(0xDEAD0000_0000_7000_8000_000000000001))
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// A plausible insurance provider
    pub fn provider_name() -> &'static str {
        "Lakeshore Health Assurance"
    }

    /// A plausible policy number
    pub fn policy_number() -> &'static str {
        "LHA-2024-004417"
    }

    /// A plausible charge description
    pub fn charge_description() -> &'static str {
        "General practitioner consultation"
    }

    /// A webhook secret shared by signer and verifier in tests
    pub fn webhook_secret() -> &'static str {
        "whsec_test_a1b2c3d4e5"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_ids_are_distinct_per_index() {
        assert_ne!(IdFixtures::staff_id(1), IdFixtures::staff_id(2));
        assert_eq!(IdFixtures::staff_id(3), IdFixtures::staff_id(3));
    }

    #[test]
    fn test_cashier_cannot_approve_insurance() {
        let cashier = ActorFixtures::cashier();
        assert!(cashier.can(Capability::CollectPayment));
        assert!(!cashier.can(Capability::ApproveInsurance));
    }
}
