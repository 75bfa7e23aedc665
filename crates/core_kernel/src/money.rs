//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! The platform operates in a single facility currency, so amounts carry no
//! currency dimension; negative amounts are legal and represent credits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Rate must be between 0 and 100, got {0}")]
    InvalidRate(Decimal),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in the facility currency
///
/// Money uses rust_decimal for precise arithmetic without floating-point
/// errors. Amounts are stored with 2 decimal places using banker's rounding.
/// A negative amount is a credit owed back to the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    amount: Decimal,
}

impl Money {
    /// Number of decimal places carried by every amount
    pub const DECIMAL_PLACES: u32 = 2;

    /// Creates a new Money value, rounded half-to-even to 2 decimal places
    ///
    /// The scale is normalized to exactly 2 so that serialized amounts always
    /// read "0.00" rather than "0".
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp_with_strategy(
            Self::DECIMAL_PLACES,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        );
        amount.rescale(Self::DECIMAL_PLACES);
        Self { amount }
    }

    /// Creates Money from an integer amount in minor units (e.g., kobo, cents)
    pub fn from_minor(minor_units: i64) -> Self {
        Self::new(Decimal::new(minor_units, Self::DECIMAL_PLACES))
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self { amount: dec!(0.00) }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
        }
    }

    /// Clamps negative amounts to zero, leaving positive amounts unchanged
    pub fn max_zero(&self) -> Self {
        if self.amount.is_sign_negative() {
            Self::zero()
        } else {
            *self
        }
    }

    /// Checked addition that fails on numeric overflow
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.amount
            .checked_add(other.amount)
            .map(Money::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction that fails on numeric overflow
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.amount
            .checked_sub(other.amount)
            .map(Money::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by a scalar (e.g., for rate calculations)
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor)
    }

    /// Sums a sequence of amounts with overflow checking
    pub fn checked_sum<'a, I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.amount)
    }
}

/// A percentage rate between 0 and 100
///
/// Used for percent-based insurance coverage. Rates carry 4 decimal places
/// so values like 33.3333 survive a round trip; applying a rate to an amount
/// rounds half-to-even back down to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate {
    percent: Decimal,
}

impl Rate {
    /// Number of decimal places carried by a rate
    pub const DECIMAL_PLACES: u32 = 4;

    /// Creates a rate from a percentage value
    ///
    /// # Errors
    ///
    /// Returns an error when the value lies outside 0..=100.
    pub fn from_percent(percent: Decimal) -> Result<Self, MoneyError> {
        if percent < Decimal::ZERO || percent > dec!(100) {
            return Err(MoneyError::InvalidRate(percent));
        }
        let mut percent = percent.round_dp_with_strategy(
            Self::DECIMAL_PLACES,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        );
        percent.rescale(Self::DECIMAL_PLACES);
        Ok(Self { percent })
    }

    /// Returns the percentage value
    pub fn percent(&self) -> Decimal {
        self.percent
    }

    /// Applies the rate to an amount
    pub fn apply_to(&self, amount: Money) -> Money {
        Money::new(amount.amount() * self.percent / dec!(100))
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_percent(value)
    }
}

impl From<Rate> for Decimal {
    fn from(rate: Rate) -> Decimal {
        rate.percent
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent.normalize())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other).expect("Overflow in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other).expect("Overflow in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount)
    }
}
