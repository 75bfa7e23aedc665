//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use domain_audit::{AuditAction, AuditLogEntry};
use domain_billing::{BillingSummary, PaymentStatus, Visit, VisitEvent};
use domain_wallet::{Wallet, WalletTransaction};
use core_kernel::Money;
use rust_decimal::Decimal;

/// Asserts that a Money value equals an expected decimal amount
///
/// # Panics
///
/// Panics if the amounts differ.
pub fn assert_money_eq(actual: Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Money mismatch: actual={}, expected={}",
        actual.amount(),
        expected
    );
}

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: Money) {
    assert!(
        money.is_positive(),
        "Expected positive money, got {}",
        money.amount()
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {}",
        money.amount()
    );
}

/// Asserts that a summary carries an expected outstanding balance
pub fn assert_outstanding(summary: &BillingSummary, expected: Decimal) {
    assert_eq!(
        summary.outstanding.amount(),
        expected,
        "Outstanding mismatch for visit {}: actual={}, expected={}",
        summary.visit_id,
        summary.outstanding.amount(),
        expected
    );
}

/// Asserts that a summary carries an expected patient payable
pub fn assert_payable(summary: &BillingSummary, expected: Decimal) {
    assert_eq!(
        summary.patient_payable.amount(),
        expected,
        "Payable mismatch for visit {}: actual={}, expected={}",
        summary.visit_id,
        summary.patient_payable.amount(),
        expected
    );
}

/// Asserts that a visit's stored payment status matches
///
/// The stored status is what closure decisions read, so scenario tests
/// check it rather than recomputing from records.
pub fn assert_status(visit: &Visit, expected: PaymentStatus) {
    assert_eq!(
        visit.payment_status(),
        expected,
        "Stored status mismatch for visit {}: actual={:?}, expected={:?}",
        visit.id(),
        visit.payment_status(),
        expected
    );
}

/// Asserts that a summary derives an expected payment status
pub fn assert_derived(summary: &BillingSummary, expected: PaymentStatus) {
    assert_eq!(
        summary.derived_status,
        expected,
        "Derived status mismatch for visit {}: actual={:?}, expected={:?}",
        summary.visit_id,
        summary.derived_status,
        expected
    );
}

/// Asserts that an event stream matches an expected type sequence
///
/// # Panics
///
/// Panics if the lengths differ or any event type is out of place.
pub fn assert_event_sequence(events: &[VisitEvent], expected: &[&str]) {
    let actual: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        actual, expected,
        "Event sequence mismatch: actual={:?}, expected={:?}",
        actual, expected
    );
}

/// Asserts that an audit trail carries an expected action sequence
///
/// Entries arrive newest first from the sinks; `expected` is given in
/// that same order.
pub fn assert_audit_actions(entries: &[AuditLogEntry], expected: &[AuditAction]) {
    let actual: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actual, expected,
        "Audit action mismatch: actual={:?}, expected={:?}",
        actual, expected
    );
}

/// Asserts that a wallet's balance is reproduced by replaying its history
///
/// # Panics
///
/// Panics if the replay fails or produces a different balance than the
/// wallet row stores.
pub fn assert_wallet_replay(wallet: &Wallet, history: &[WalletTransaction]) {
    let replayed = domain_wallet::ledger::replay(history)
        .unwrap_or_else(|e| panic!("Replay of wallet {} failed: {}", wallet.id(), e));
    assert_eq!(
        replayed,
        wallet.balance(),
        "Replay of wallet {} produced {}, stored balance is {}",
        wallet.id(),
        replayed.amount(),
        wallet.balance().amount()
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
