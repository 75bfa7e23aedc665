//! Payment records
//!
//! Payments are append-only. Each record captures how the money arrived;
//! gateway payments additionally carry the external reference under which
//! the provider settled the charge. Wallet and insurance settlements never
//! appear here: wallets settle through wallet transactions and insurance
//! through the attached claim, so recording either as a payment would count
//! the same money twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use core_kernel::{Money, PaymentId, StaffId, VisitId};

use crate::error::BillingError;

/// How a payment was collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Pos,
    Transfer,
    Gateway,
    Wallet,
    Insurance,
}

impl PaymentMethod {
    /// Methods a cashier can record directly at the desk
    pub fn is_direct_entry(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Cash | PaymentMethod::Pos | PaymentMethod::Transfer
        )
    }

    /// Methods whose records count toward the patient-paid total
    ///
    /// Wallet settlements are counted through wallet transactions and
    /// insurance through claim coverage, so neither contributes here.
    pub fn counts_toward_patient_payments(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Cash
                | PaymentMethod::Pos
                | PaymentMethod::Transfer
                | PaymentMethod::Gateway
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Pos => "POS",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Gateway => "GATEWAY",
            PaymentMethod::Wallet => "WALLET",
            PaymentMethod::Insurance => "INSURANCE",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "POS" => Ok(PaymentMethod::Pos),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            "GATEWAY" => Ok(PaymentMethod::Gateway),
            "WALLET" => Ok(PaymentMethod::Wallet),
            "INSURANCE" => Ok(PaymentMethod::Insurance),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// A settled amount received toward a visit's bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Visit the payment settles against
    pub visit_id: VisitId,
    /// Amount received
    pub amount: Money,
    /// Collection method
    pub method: PaymentMethod,
    /// Provider reference, present on gateway payments only
    pub external_reference: Option<String>,
    /// Human-facing receipt number
    pub receipt_number: String,
    /// Staff member who recorded the payment
    pub recorded_by: StaffId,
    /// When the payment was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    /// Records a payment collected directly at the desk
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive, the method requires
    /// a dedicated flow (wallet, insurance), or the method is gateway,
    /// which must arrive through reconciliation with a provider reference.
    pub fn new(
        visit_id: VisitId,
        amount: Money,
        method: PaymentMethod,
        recorded_by: StaffId,
    ) -> Result<Self, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::AmountNotPositive {
                amount: amount.amount(),
            });
        }
        if method == PaymentMethod::Gateway {
            return Err(BillingError::MissingExternalReference);
        }
        if !method.is_direct_entry() {
            return Err(BillingError::MethodRequiresDedicatedFlow { method });
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            visit_id,
            amount,
            method,
            external_reference: None,
            receipt_number: generate_receipt_number(),
            recorded_by,
            recorded_at: Utc::now(),
        })
    }

    /// Records a payment settled by the payment gateway
    ///
    /// Only the gateway reconciler calls this, after the provider has
    /// confirmed the referenced transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or the external
    /// reference is empty.
    pub fn from_gateway(
        visit_id: VisitId,
        amount: Money,
        external_reference: impl Into<String>,
        recorded_by: StaffId,
    ) -> Result<Self, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::AmountNotPositive {
                amount: amount.amount(),
            });
        }
        let external_reference = external_reference.into();
        if external_reference.trim().is_empty() {
            return Err(BillingError::MissingExternalReference);
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            visit_id,
            amount,
            method: PaymentMethod::Gateway,
            external_reference: Some(external_reference),
            receipt_number: generate_receipt_number(),
            recorded_by,
            recorded_at: Utc::now(),
        })
    }
}

fn generate_receipt_number() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("RCP-{}", duration.as_millis() % 10_000_000_000)
}
