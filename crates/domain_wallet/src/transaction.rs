//! Wallet transactions
//!
//! Every balance movement is an immutable transaction row carrying the
//! balance after it applied. The stored balance on the wallet is a
//! convenience; replaying the ordered transactions must always reproduce
//! it, which is what keeps tampering detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Money, StaffId, VisitId, WalletId, WalletTransactionId};

/// Which way the money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Money into the wallet (top-up)
    Credit,
    /// Money out of the wallet (visit settlement)
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "CREDIT",
            Direction::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(Direction::Credit),
            "DEBIT" => Ok(Direction::Debit),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// An immutable wallet balance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Unique identifier
    pub id: WalletTransactionId,
    /// Wallet the movement belongs to
    pub wallet_id: WalletId,
    /// Visit this debit settled, present on visit-funding debits only
    pub visit_id: Option<VisitId>,
    /// Movement direction
    pub direction: Direction,
    /// Amount moved, strictly positive
    pub amount: Money,
    /// Wallet balance after this movement applied
    pub balance_after: Money,
    /// Staff member who recorded the movement
    pub recorded_by: StaffId,
    /// When the movement was recorded
    pub recorded_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// True when this debit settled part of a visit's bill
    pub fn is_visit_settlement(&self) -> bool {
        self.direction == Direction::Debit && self.visit_id.is_some()
    }
}
