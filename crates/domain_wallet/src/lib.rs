//! Wallet Domain - Patient Wallet Sub-ledger
//!
//! Patients can hold prepaid money in a wallet and settle visit bills
//! from it. This crate owns the wallet aggregate, its immutable
//! transaction history, and the balance arithmetic that enforces
//! overdraft protection.
//!
//! # Invariants
//!
//! - The balance never goes negative, with or without concurrent debits
//! - Transactions are immutable and carry the balance after they applied
//! - Replaying the ordered history from zero reproduces the stored
//!   balance exactly
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_wallet::{Wallet, ledger};
//!
//! let mut wallet = Wallet::open(patient_id);
//! let top_up = wallet.credit(amount, cashier)?;
//! let settlement = wallet.debit_for_visit(visit_id, bill_share, cashier)?;
//! assert_eq!(ledger::replay(&[top_up, settlement])?, wallet.balance());
//! ```

pub mod error;
pub mod ledger;
pub mod ports;
pub mod transaction;
pub mod wallet;

pub use error::WalletError;
pub use ports::{CreditOutcome, WalletStore};
pub use transaction::{Direction, WalletTransaction};
pub use wallet::Wallet;
