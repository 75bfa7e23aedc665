//! Insurance claims
//!
//! A visit carries at most one insurance claim. A claim starts pending and
//! can only move to approved; there is no rejection or detachment path, so
//! an unusable claim simply stays pending and never reduces what the
//! patient owes. Coverage counts toward the bill only once approved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{InsuranceId, Money, Rate, StaffId, VisitId};

use crate::error::BillingError;

/// Coverage terms of a claim
///
/// An insurer covers either a fixed amount or a percentage of the visit's
/// total charges. Amount coverage is capped at the charges it is applied
/// against; percent coverage can never exceed them because rates stop at 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coverage {
    Amount(Money),
    Percent(Rate),
}

impl Coverage {
    /// Covered portion of the given total charges
    pub fn against(&self, total_charges: Money) -> Money {
        let base = total_charges.max_zero();
        match self {
            Coverage::Amount(amount) => (*amount).min(base),
            Coverage::Percent(rate) => rate.apply_to(base),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Coverage::Amount(_) => "AMOUNT",
            Coverage::Percent(_) => "PERCENT",
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coverage::Amount(amount) => write!(f, "{}", amount),
            Coverage::Percent(rate) => write!(f, "{}", rate),
        }
    }
}

/// Claim lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsuranceStatus {
    Pending,
    Approved,
}

impl InsuranceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsuranceStatus::Pending => "PENDING",
            InsuranceStatus::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for InsuranceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InsuranceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InsuranceStatus::Pending),
            "APPROVED" => Ok(InsuranceStatus::Approved),
            other => Err(format!("unknown insurance status '{}'", other)),
        }
    }
}

/// An insurance claim attached to a visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insurance {
    /// Unique identifier
    pub id: InsuranceId,
    /// Visit the claim covers
    pub visit_id: VisitId,
    /// Insurer name
    pub provider_name: String,
    /// Policy number with the insurer
    pub policy_number: String,
    /// What the insurer covers once approved
    pub coverage: Coverage,
    /// Lifecycle state
    pub status: InsuranceStatus,
    /// Staff member who attached the claim
    pub attached_by: StaffId,
    /// When the claim was attached
    pub attached_at: DateTime<Utc>,
    /// Staff member who approved the claim
    pub approved_by: Option<StaffId>,
    /// When the claim was approved
    pub approved_at: Option<DateTime<Utc>>,
}

impl Insurance {
    /// Attaches a new pending claim
    ///
    /// # Errors
    ///
    /// Returns an error if the coverage is not positive or the provider
    /// name or policy number is empty.
    pub fn new(
        visit_id: VisitId,
        provider_name: impl Into<String>,
        policy_number: impl Into<String>,
        coverage: Coverage,
        attached_by: StaffId,
    ) -> Result<Self, BillingError> {
        match coverage {
            Coverage::Amount(amount) if !amount.is_positive() => {
                return Err(BillingError::AmountNotPositive {
                    amount: amount.amount(),
                });
            }
            Coverage::Percent(rate) if rate.percent().is_zero() => {
                return Err(BillingError::validation(
                    "Coverage percentage must be greater than zero",
                ));
            }
            _ => {}
        }
        let provider_name = provider_name.into();
        if provider_name.trim().is_empty() {
            return Err(BillingError::validation("Insurance provider name is required"));
        }
        let policy_number = policy_number.into();
        if policy_number.trim().is_empty() {
            return Err(BillingError::validation("Insurance policy number is required"));
        }

        Ok(Self {
            id: InsuranceId::new_v7(),
            visit_id,
            provider_name,
            policy_number,
            coverage,
            status: InsuranceStatus::Pending,
            attached_by,
            attached_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        })
    }

    /// Approves the claim
    ///
    /// # Errors
    ///
    /// Returns an error if the claim is already approved.
    pub fn approve(&mut self, approved_by: StaffId) -> Result<(), BillingError> {
        if self.status == InsuranceStatus::Approved {
            return Err(BillingError::InvalidStateTransition {
                from: self.status.to_string(),
                to: InsuranceStatus::Approved.to_string(),
            });
        }

        self.status = InsuranceStatus::Approved;
        self.approved_by = Some(approved_by);
        self.approved_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == InsuranceStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.status == InsuranceStatus::Approved
    }

    /// Covered portion of the given total charges per the claim's terms
    ///
    /// Computed from the terms regardless of status; callers decide whether
    /// the claim is approved enough to count.
    pub fn coverage_against(&self, total_charges: Money) -> Money {
        self.coverage.against(total_charges)
    }
}
