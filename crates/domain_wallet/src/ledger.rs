//! Wallet balance arithmetic
//!
//! Pure functions shared by the aggregate and the storage adapters. The
//! overdraft rule lives here and nowhere else: a debit larger than the
//! available balance is rejected before anything is written, so no code
//! path can produce a negative balance.

use core_kernel::Money;

use crate::error::WalletError;
use crate::transaction::{Direction, WalletTransaction};

/// Applies a top-up to a balance
///
/// # Errors
///
/// Returns an error if the amount is not positive or the addition
/// overflows.
pub fn apply_credit(balance: Money, amount: Money) -> Result<Money, WalletError> {
    if !amount.is_positive() {
        return Err(WalletError::AmountNotPositive {
            amount: amount.amount(),
        });
    }
    balance
        .checked_add(&amount)
        .map_err(|e| WalletError::Financial(e.to_string()))
}

/// Applies a debit to a balance
///
/// # Errors
///
/// Returns an error if the amount is not positive, or larger than the
/// available balance.
pub fn apply_debit(balance: Money, amount: Money) -> Result<Money, WalletError> {
    if !amount.is_positive() {
        return Err(WalletError::AmountNotPositive {
            amount: amount.amount(),
        });
    }
    if amount > balance {
        return Err(WalletError::InsufficientBalance {
            available: balance.amount(),
            requested: amount.amount(),
        });
    }
    balance
        .checked_sub(&amount)
        .map_err(|e| WalletError::Financial(e.to_string()))
}

/// Replays an ordered transaction history from a zero balance
///
/// Returns the final balance. Each step is checked against the
/// `balance_after` stored on the transaction, so a history that was
/// tampered with, reordered, or truncated in the middle fails loudly.
///
/// # Errors
///
/// Returns `LedgerIntegrity` when a stored `balance_after` disagrees
/// with the replayed value, and the underlying arithmetic errors when a
/// replayed debit would overdraw.
pub fn replay<'a, I>(transactions: I) -> Result<Money, WalletError>
where
    I: IntoIterator<Item = &'a WalletTransaction>,
{
    let mut balance = Money::zero();

    for transaction in transactions {
        balance = match transaction.direction {
            Direction::Credit => apply_credit(balance, transaction.amount)?,
            Direction::Debit => apply_debit(balance, transaction.amount)?,
        };

        if balance != transaction.balance_after {
            return Err(WalletError::LedgerIntegrity(format!(
                "Transaction {} stored balance {} but replay produced {}",
                transaction.id, transaction.balance_after, balance
            )));
        }
    }

    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{StaffId, WalletId, WalletTransactionId};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn transaction(
        wallet_id: WalletId,
        direction: Direction,
        amount: Decimal,
        balance_after: Decimal,
    ) -> WalletTransaction {
        WalletTransaction {
            id: WalletTransactionId::new_v7(),
            wallet_id,
            visit_id: None,
            direction,
            amount: Money::new(amount),
            balance_after: Money::new(balance_after),
            recorded_by: StaffId::new(),
            recorded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_credit_increases_balance() {
        let balance = apply_credit(Money::new(dec!(1000)), Money::new(dec!(250))).unwrap();
        assert_eq!(balance.amount(), dec!(1250));
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        assert!(matches!(
            apply_credit(Money::zero(), Money::zero()),
            Err(WalletError::AmountNotPositive { .. })
        ));
        assert!(matches!(
            apply_credit(Money::zero(), Money::new(dec!(-5))),
            Err(WalletError::AmountNotPositive { .. })
        ));
    }

    #[test]
    fn test_debit_within_balance() {
        let balance = apply_debit(Money::new(dec!(1000)), Money::new(dec!(1000))).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn test_debit_beyond_balance_rejected() {
        let result = apply_debit(Money::new(dec!(1000)), Money::new(dec!(1500)));
        match result {
            Err(WalletError::InsufficientBalance {
                available,
                requested,
            }) => {
                assert_eq!(available, dec!(1000));
                assert_eq!(requested, dec!(1500));
            }
            other => panic!("expected insufficiency, got {:?}", other),
        }
    }

    #[test]
    fn test_replay_reproduces_balance() {
        let wallet_id = WalletId::new();
        let history = vec![
            transaction(wallet_id, Direction::Credit, dec!(5000), dec!(5000)),
            transaction(wallet_id, Direction::Debit, dec!(1200), dec!(3800)),
            transaction(wallet_id, Direction::Credit, dec!(200), dec!(4000)),
            transaction(wallet_id, Direction::Debit, dec!(4000), dec!(0)),
        ];

        let balance = replay(&history).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn test_replay_detects_tampered_balance() {
        let wallet_id = WalletId::new();
        let history = vec![
            transaction(wallet_id, Direction::Credit, dec!(5000), dec!(5000)),
            transaction(wallet_id, Direction::Debit, dec!(1200), dec!(9999)),
        ];

        assert!(matches!(
            replay(&history),
            Err(WalletError::LedgerIntegrity(_))
        ));
    }

    #[test]
    fn test_replay_rejects_history_that_overdraws() {
        let wallet_id = WalletId::new();
        let history = vec![
            transaction(wallet_id, Direction::Credit, dec!(1000), dec!(1000)),
            transaction(wallet_id, Direction::Debit, dec!(2500), dec!(0)),
        ];

        assert!(replay(&history).is_err());
    }

    proptest! {
        #[test]
        fn prop_replay_never_goes_negative(
            moves in proptest::collection::vec((any::<bool>(), 1i64..100_000), 1..40)
        ) {
            let wallet_id = WalletId::new();
            let mut balance = Money::zero();
            let mut history = Vec::new();

            for (is_credit, minor) in moves {
                let amount = Money::new(Decimal::new(minor, 2));
                if is_credit {
                    balance = apply_credit(balance, amount).unwrap();
                    history.push(transaction(
                        wallet_id,
                        Direction::Credit,
                        amount.amount(),
                        balance.amount(),
                    ));
                } else {
                    match apply_debit(balance, amount) {
                        Ok(next) => {
                            balance = next;
                            history.push(transaction(
                                wallet_id,
                                Direction::Debit,
                                amount.amount(),
                                balance.amount(),
                            ));
                        }
                        Err(WalletError::InsufficientBalance { .. }) => {
                            // rejected debits leave no row behind
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                prop_assert!(!balance.is_negative());
            }

            let replayed = replay(&history).unwrap();
            prop_assert_eq!(replayed, balance);
        }
    }
}
