//! Wallet aggregate root
//!
//! A patient holds one wallet: prepaid money that can settle visit
//! bills. The aggregate owns the overdraft rule through the ledger
//! arithmetic; storage adapters serialize concurrent movements on one
//! wallet so the check-and-write is atomic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, PatientId, StaffId, VisitId, WalletId, WalletTransactionId};

use crate::error::WalletError;
use crate::ledger;
use crate::transaction::{Direction, WalletTransaction};

/// The Wallet aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier
    id: WalletId,
    /// Patient who owns the wallet
    patient_id: PatientId,
    /// Current balance, never negative
    balance: Money,
    /// Version for optimistic concurrency
    version: u32,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Opens a new empty wallet for a patient
    pub fn open(patient_id: PatientId) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new_v7(),
            patient_id,
            balance: Money::zero(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a wallet from persisted state
    pub fn reconstitute(
        id: WalletId,
        patient_id: PatientId,
        balance: Money,
        version: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id,
            balance,
            version,
            created_at,
            updated_at,
        }
    }

    /// Returns the wallet ID
    pub fn id(&self) -> WalletId {
        self.id
    }

    /// Returns the owning patient ID
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    /// Returns the current balance
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Returns the concurrency version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True when the wallet can fund the amount
    pub fn can_fund(&self, amount: Money) -> bool {
        amount.is_positive() && amount <= self.balance
    }

    /// Tops up the wallet
    ///
    /// Returns the transaction row to persist alongside the updated
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive.
    pub fn credit(
        &mut self,
        amount: Money,
        recorded_by: StaffId,
    ) -> Result<WalletTransaction, WalletError> {
        let balance_after = ledger::apply_credit(self.balance, amount)?;
        Ok(self.record(Direction::Credit, amount, balance_after, None, recorded_by))
    }

    /// Debits the wallet to settle part of a visit's bill
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` when the wallet cannot fund the
    /// amount; the balance is untouched and no transaction exists.
    pub fn debit_for_visit(
        &mut self,
        visit_id: VisitId,
        amount: Money,
        recorded_by: StaffId,
    ) -> Result<WalletTransaction, WalletError> {
        let balance_after = match ledger::apply_debit(self.balance, amount) {
            Ok(balance) => balance,
            Err(e) => {
                if matches!(e, WalletError::InsufficientBalance { .. }) {
                    tracing::warn!(
                        wallet_id = %self.id,
                        visit_id = %visit_id,
                        available = %self.balance,
                        requested = %amount,
                        "wallet debit rejected"
                    );
                }
                return Err(e);
            }
        };

        Ok(self.record(
            Direction::Debit,
            amount,
            balance_after,
            Some(visit_id),
            recorded_by,
        ))
    }

    /// Bumps the concurrency version after a successful persist
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    fn record(
        &mut self,
        direction: Direction,
        amount: Money,
        balance_after: Money,
        visit_id: Option<VisitId>,
        recorded_by: StaffId,
    ) -> WalletTransaction {
        let now = Utc::now();
        self.balance = balance_after;
        self.updated_at = now;

        WalletTransaction {
            id: WalletTransactionId::new_v7(),
            wallet_id: self.id,
            visit_id,
            direction,
            amount,
            balance_after,
            recorded_by,
            recorded_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet() -> Wallet {
        Wallet::open(PatientId::new())
    }

    #[test]
    fn test_new_wallet_is_empty() {
        let wallet = wallet();
        assert!(wallet.balance().is_zero());
        assert_eq!(wallet.version(), 1);
        assert!(!wallet.can_fund(Money::new(dec!(1))));
    }

    #[test]
    fn test_credit_updates_balance_and_builds_row() {
        let mut wallet = wallet();
        let staff = StaffId::new();

        let tx = wallet.credit(Money::new(dec!(5000)), staff).unwrap();

        assert_eq!(wallet.balance().amount(), dec!(5000));
        assert_eq!(tx.direction, Direction::Credit);
        assert_eq!(tx.amount.amount(), dec!(5000));
        assert_eq!(tx.balance_after.amount(), dec!(5000));
        assert_eq!(tx.wallet_id, wallet.id());
        assert_eq!(tx.visit_id, None);
        assert_eq!(tx.recorded_by, staff);
    }

    #[test]
    fn test_debit_carries_visit_reference() {
        let mut wallet = wallet();
        wallet.credit(Money::new(dec!(5000)), StaffId::new()).unwrap();

        let visit_id = VisitId::new_v7();
        let tx = wallet
            .debit_for_visit(visit_id, Money::new(dec!(1500)), StaffId::new())
            .unwrap();

        assert_eq!(wallet.balance().amount(), dec!(3500));
        assert_eq!(tx.visit_id, Some(visit_id));
        assert!(tx.is_visit_settlement());
        assert_eq!(tx.balance_after.amount(), dec!(3500));
    }

    #[test]
    fn test_overdraft_rejected_and_balance_untouched() {
        let mut wallet = wallet();
        wallet.credit(Money::new(dec!(1000)), StaffId::new()).unwrap();

        let result =
            wallet.debit_for_visit(VisitId::new_v7(), Money::new(dec!(1500)), StaffId::new());

        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.balance().amount(), dec!(1000));
    }

    #[test]
    fn test_exact_balance_debit_allowed() {
        let mut wallet = wallet();
        wallet.credit(Money::new(dec!(1000)), StaffId::new()).unwrap();

        wallet
            .debit_for_visit(VisitId::new_v7(), Money::new(dec!(1000)), StaffId::new())
            .unwrap();
        assert!(wallet.balance().is_zero());
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut wallet = wallet();
        assert!(matches!(
            wallet.credit(Money::zero(), StaffId::new()),
            Err(WalletError::AmountNotPositive { .. })
        ));
        assert!(matches!(
            wallet.debit_for_visit(VisitId::new_v7(), Money::new(dec!(-10)), StaffId::new()),
            Err(WalletError::AmountNotPositive { .. })
        ));
    }
}
