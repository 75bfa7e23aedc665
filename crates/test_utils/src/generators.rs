//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Money, PatientId, StaffId, VisitId};
use domain_billing::{Department, PaymentMethod};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for generating positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for generating positive two-decimal amounts
pub fn positive_decimal_strategy() -> impl Strategy<Value = Decimal> {
    positive_amount_minor_strategy().prop_map(|minor| Decimal::new(minor, 2))
}

/// Strategy for generating any department
pub fn department_strategy() -> impl Strategy<Value = Department> {
    prop_oneof![
        Just(Department::Consultation),
        Just(Department::Laboratory),
        Just(Department::Radiology),
        Just(Department::Pharmacy),
        Just(Department::Nursing),
        Just(Department::Procedure),
        Just(Department::Admission),
        Just(Department::Other),
    ]
}

/// Strategy for generating methods a cashier can enter at the desk
pub fn direct_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Pos),
        Just(PaymentMethod::Transfer),
    ]
}

/// Strategy for generating charge descriptions
pub fn description_strategy() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{3,10}", "[a-z]{4,12}")
        .prop_map(|(first, second)| format!("{} {}", first, second))
}

/// Strategy for generating lists of charge amounts in minor units
pub fn charge_amounts_strategy() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(positive_amount_minor_strategy(), 1..8)
}

/// Strategy for generating gateway payment references
pub fn gateway_reference_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{16}".prop_map(|hex| format!("gw_{}", hex))
}

/// Strategy for generating VisitId
pub fn visit_id_strategy() -> impl Strategy<Value = VisitId> {
    any::<[u8; 16]>().prop_map(|bytes| VisitId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating PatientId
pub fn patient_id_strategy() -> impl Strategy<Value = PatientId> {
    any::<[u8; 16]>().prop_map(|bytes| PatientId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating StaffId
pub fn staff_id_strategy() -> impl Strategy<Value = StaffId> {
    any::<[u8; 16]>().prop_map(|bytes| StaffId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn positive_money_is_always_positive(money in positive_money_strategy()) {
            prop_assert!(money.amount() > Decimal::ZERO);
        }

        #[test]
        fn positive_decimals_have_two_places(amount in positive_decimal_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() == 2);
        }

        #[test]
        fn direct_methods_are_direct_entry(method in direct_method_strategy()) {
            prop_assert!(method.is_direct_entry());
        }

        #[test]
        fn gateway_references_carry_prefix(reference in gateway_reference_strategy()) {
            prop_assert!(reference.starts_with("gw_"));
            prop_assert_eq!(reference.len(), 19);
        }
    }
}
