//! Postgres adapter round-trip checks
//!
//! These need a Docker daemon for the throwaway Postgres container,
//! so they are ignored by default. Run them with:
//!
//! ```bash
//! cargo test -p infra_db --test pg_roundtrip -- --ignored
//! ```

use rust_decimal_macros::dec;

use core_kernel::Money;
use domain_audit::{AuditPage, AuditSink};
use domain_billing::{Department, LedgerStore, LedgerStoreExt, PaymentStatus};
use domain_wallet::WalletStore;
use infra_db::{DatabaseError, PgAuditSink, PgLedgerStore, PgWalletStore};
use test_utils::{ActorFixtures, ChargeRequestBuilder, IdFixtures, TestDatabase};

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_pg_visit_lifecycle_round_trip() {
    let db = TestDatabase::new().await.expect("start postgres container");
    let store = PgLedgerStore::new(db.pool().clone());
    let audit = PgAuditSink::new(db.pool().clone());
    let admin = ActorFixtures::admin();

    let visit = store
        .open_visit(IdFixtures::patient_id(), &admin)
        .await
        .unwrap();
    assert_eq!(visit.payment_status(), PaymentStatus::Unpaid);

    let charged = store
        .record_charge(
            ChargeRequestBuilder::new(visit.id())
                .with_department(Department::Consultation)
                .with_amount(dec!(5000.00))
                .build(),
            &admin,
        )
        .await
        .unwrap();
    assert_eq!(charged.clearing.summary.outstanding.amount(), dec!(5000.00));

    let paid = store
        .record_cash_payment(visit.id(), dec!(5000.00), &admin)
        .await
        .unwrap();
    assert_eq!(paid.clearing.status_after, PaymentStatus::Paid);

    // The stored status survives a fresh read from the database.
    let reloaded = store.visit(visit.id()).await.unwrap();
    assert_eq!(reloaded.payment_status(), PaymentStatus::Paid);

    let closed = store.close_visit(visit.id(), &admin).await.unwrap();
    assert!(closed.is_closed());

    let trail = audit
        .list_for_visit(visit.id(), AuditPage::default())
        .await
        .unwrap();
    assert_eq!(trail.len(), 4);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_pg_triggers_refuse_update_and_delete_on_stored_records() {
    let db = TestDatabase::new().await.expect("start postgres container");
    let store = PgLedgerStore::new(db.pool().clone());
    let wallets = PgWalletStore::new(db.pool().clone());
    let admin = ActorFixtures::admin();

    // Seed one row into each guarded table.
    let visit = store
        .open_visit(IdFixtures::patient_id(), &admin)
        .await
        .unwrap();
    store
        .record_charge(
            ChargeRequestBuilder::new(visit.id())
                .with_amount(dec!(1000.00))
                .build(),
            &admin,
        )
        .await
        .unwrap();
    store
        .record_cash_payment(visit.id(), dec!(400.00), &admin)
        .await
        .unwrap();
    let wallet = wallets
        .open_wallet(IdFixtures::patient_id(), &admin)
        .await
        .unwrap();
    wallets
        .credit(wallet.id(), Money::new(dec!(200.00)), &admin)
        .await
        .unwrap();

    let statements = [
        "UPDATE charges SET amount = amount + 1",
        "DELETE FROM charges",
        "UPDATE payments SET amount = amount + 1",
        "DELETE FROM payments",
        "UPDATE wallet_transactions SET amount = amount + 1",
        "DELETE FROM wallet_transactions",
        "UPDATE audit_log SET actor_role = 'tampered'",
        "DELETE FROM audit_log",
    ];

    for statement in statements {
        let err = sqlx::query(statement)
            .execute(db.pool())
            .await
            .expect_err(statement);
        let mapped = DatabaseError::from(&err);
        assert!(
            matches!(mapped, DatabaseError::ImmutableRecord { .. }),
            "{statement} must be refused by the append-only guard, got {mapped:?}"
        );
    }

    // The ledger still reads back intact.
    let summary = store.billing_summary(visit.id()).await.unwrap();
    assert_eq!(summary.total_charges.amount(), dec!(1000.00));
    assert_eq!(summary.total_payments.amount(), dec!(400.00));
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_pg_wallet_debit_settles_and_balances() {
    let db = TestDatabase::new().await.expect("start postgres container");
    let store = PgLedgerStore::new(db.pool().clone());
    let wallets = PgWalletStore::new(db.pool().clone());
    let admin = ActorFixtures::admin();

    let visit = store
        .open_visit(IdFixtures::patient_id(), &admin)
        .await
        .unwrap();
    store
        .record_charge(
            ChargeRequestBuilder::new(visit.id())
                .with_department(Department::Pharmacy)
                .with_amount(dec!(1500.00))
                .build(),
            &admin,
        )
        .await
        .unwrap();

    let wallet = wallets
        .open_wallet(IdFixtures::patient_id(), &admin)
        .await
        .unwrap();
    wallets
        .credit(wallet.id(), Money::new(dec!(2000.00)), &admin)
        .await
        .unwrap();

    let outcome = store
        .apply_wallet_debit(visit.id(), wallet.id(), Money::new(dec!(1500.00)), &admin)
        .await
        .unwrap();
    assert_eq!(outcome.balance_after.amount(), dec!(500.00));
    assert_eq!(outcome.clearing.status_after, PaymentStatus::Paid);

    let reloaded = wallets.wallet(wallet.id()).await.unwrap();
    assert_eq!(reloaded.balance().amount(), dec!(500.00));

    let err = store
        .apply_wallet_debit(visit.id(), wallet.id(), Money::new(dec!(501.00)), &admin)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}
