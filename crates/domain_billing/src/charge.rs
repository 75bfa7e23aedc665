//! Department charges
//!
//! Charges are append-only: once recorded they are never edited or deleted.
//! A mistaken charge is corrected by recording a compensating entry that
//! carries the negated amount and a link back to the original.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ChargeId, Money, StaffId, VisitId};

use crate::error::BillingError;

/// Clinical departments that raise charges against a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Consultation,
    Laboratory,
    Radiology,
    Pharmacy,
    Nursing,
    Procedure,
    Admission,
    Other,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Consultation => "consultation",
            Department::Laboratory => "laboratory",
            Department::Radiology => "radiology",
            Department::Pharmacy => "pharmacy",
            Department::Nursing => "nursing",
            Department::Procedure => "procedure",
            Department::Admission => "admission",
            Department::Other => "other",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consultation" => Ok(Department::Consultation),
            "laboratory" => Ok(Department::Laboratory),
            "radiology" => Ok(Department::Radiology),
            "pharmacy" => Ok(Department::Pharmacy),
            "nursing" => Ok(Department::Nursing),
            "procedure" => Ok(Department::Procedure),
            "admission" => Ok(Department::Admission),
            "other" => Ok(Department::Other),
            unknown => Err(format!("unknown department '{}'", unknown)),
        }
    }
}

/// A billable service recorded against a visit
///
/// The amount is strictly positive for ordinary charges and strictly
/// negative for compensating entries, which also carry the id of the
/// charge they reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Unique identifier
    pub id: ChargeId,
    /// Visit this charge belongs to
    pub visit_id: VisitId,
    /// Department that raised the charge
    pub department: Department,
    /// Service description
    pub description: String,
    /// Charge amount (negative for compensating entries)
    pub amount: Money,
    /// Original charge, when this entry is a compensating reversal
    pub reverses: Option<ChargeId>,
    /// Staff member who recorded the charge
    pub recorded_by: StaffId,
    /// When the charge was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Charge {
    /// Records a new charge
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is zero or negative, or the
    /// description is empty.
    pub fn new(
        visit_id: VisitId,
        department: Department,
        description: impl Into<String>,
        amount: Money,
        recorded_by: StaffId,
    ) -> Result<Self, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::AmountNotPositive {
                amount: amount.amount(),
            });
        }
        let description = description.into();
        if description.trim().is_empty() {
            return Err(BillingError::validation("Charge description is required"));
        }

        Ok(Self {
            id: ChargeId::new_v7(),
            visit_id,
            department,
            description,
            amount,
            reverses: None,
            recorded_by,
            recorded_at: Utc::now(),
        })
    }

    /// Builds the compensating entry that cancels `original`
    ///
    /// # Errors
    ///
    /// Returns an error if `original` is itself a compensating entry;
    /// reversing a reversal would re-instate the charge through the back
    /// door instead of recording it afresh.
    pub fn reversal_of(original: &Charge, recorded_by: StaffId) -> Result<Self, BillingError> {
        if original.is_reversal() {
            return Err(BillingError::validation(
                "Compensating entries cannot themselves be reversed",
            ));
        }

        Ok(Self {
            id: ChargeId::new_v7(),
            visit_id: original.visit_id,
            department: original.department,
            description: format!("Reversal: {}", original.description),
            amount: -original.amount,
            reverses: Some(original.id),
            recorded_by,
            recorded_at: Utc::now(),
        })
    }

    /// Returns true if this entry compensates an earlier charge
    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}
