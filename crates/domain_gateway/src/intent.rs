//! Payment intents
//!
//! An intent is created when a patient chooses to pay online. The
//! provider settles against the intent's unique external reference and
//! reports back over the webhook; the reference is also the idempotency
//! key for verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use core_kernel::{Money, PaymentIntentId, StaffId, VisitId};

use crate::error::GatewayError;

/// Intent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentState {
    /// Created locally, provider not heard from yet
    Created,
    /// A provider report arrived and verification is underway
    Verifying,
    /// Verification succeeded
    Verified,
    /// The gateway payment has been recorded against the visit
    Settled,
    /// Verification failed definitively
    Failed,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::Created => "CREATED",
            IntentState::Verifying => "VERIFYING",
            IntentState::Verified => "VERIFIED",
            IntentState::Settled => "SETTLED",
            IntentState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IntentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(IntentState::Created),
            "VERIFYING" => Ok(IntentState::Verifying),
            "VERIFIED" => Ok(IntentState::Verified),
            "SETTLED" => Ok(IntentState::Settled),
            "FAILED" => Ok(IntentState::Failed),
            other => Err(format!("unknown intent state '{}'", other)),
        }
    }
}

/// A gateway payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Unique identifier
    pub id: PaymentIntentId,
    /// Visit the payment is for
    pub visit_id: VisitId,
    /// Amount the provider should collect
    pub amount: Money,
    /// Provider label (for reporting, not routing)
    pub provider: String,
    /// Unique reference the provider settles under
    pub external_reference: String,
    /// Lifecycle state
    pub state: IntentState,
    /// Why verification failed, when it did
    pub failure_reason: Option<String>,
    /// Staff member who created the intent
    pub created_by: StaffId,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Creates a new intent with a generated external reference
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or the provider
    /// label is empty.
    pub fn new(
        visit_id: VisitId,
        amount: Money,
        provider: impl Into<String>,
        created_by: StaffId,
    ) -> Result<Self, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::AmountNotPositive {
                amount: amount.amount(),
            });
        }
        let provider = provider.into();
        if provider.trim().is_empty() {
            return Err(GatewayError::validation("Provider label is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id: PaymentIntentId::new_v7(),
            visit_id,
            amount,
            provider,
            external_reference: generate_external_reference(),
            state: IntentState::Created,
            failure_reason: None,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the intent into verification
    ///
    /// Idempotent for an intent already verifying, so a retried webhook
    /// delivery does not trip over its own earlier attempt.
    pub fn begin_verification(&mut self) -> Result<(), GatewayError> {
        if self.state == IntentState::Verifying {
            return Ok(());
        }
        self.transition_to(IntentState::Verifying)
    }

    /// Marks verification as successful
    pub fn mark_verified(&mut self) -> Result<(), GatewayError> {
        self.transition_to(IntentState::Verified)
    }

    /// Marks the verified payment as recorded against the visit
    pub fn settle(&mut self) -> Result<(), GatewayError> {
        self.transition_to(IntentState::Settled)
    }

    /// Fails the intent definitively
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), GatewayError> {
        self.transition_to(IntentState::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// True once verification has concluded either way
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, IntentState::Settled | IntentState::Failed)
    }

    fn transition_to(&mut self, target: IntentState) -> Result<(), GatewayError> {
        if !self.can_transition_to(target) {
            return Err(GatewayError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", target),
            });
        }
        self.state = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Checks if transition is valid
    fn can_transition_to(&self, target: IntentState) -> bool {
        use IntentState::*;
        matches!(
            (self.state, target),
            (Created, Verifying)
                | (Verifying, Verified)
                | (Verified, Settled)
                | (Created, Failed)
                | (Verifying, Failed)
        )
    }
}

/// Generates a unique external reference for an intent
///
/// Format: gw_{32 hex chars}
fn generate_external_reference() -> String {
    format!("gw_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_intent() -> PaymentIntent {
        PaymentIntent::new(
            VisitId::new_v7(),
            Money::new(dec!(12000)),
            "paystack",
            StaffId::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_intent_starts_created_with_reference() {
        let intent = make_intent();
        assert_eq!(intent.state, IntentState::Created);
        assert!(intent.external_reference.starts_with("gw_"));
        assert_eq!(intent.external_reference.len(), 35);
        assert!(intent.failure_reason.is_none());
    }

    #[test]
    fn test_references_are_unique() {
        let a = make_intent();
        let b = make_intent();
        assert_ne!(a.external_reference, b.external_reference);
    }

    #[test]
    fn test_happy_path_walks_to_settled() {
        let mut intent = make_intent();
        intent.begin_verification().unwrap();
        intent.mark_verified().unwrap();
        intent.settle().unwrap();
        assert_eq!(intent.state, IntentState::Settled);
        assert!(intent.is_terminal());
    }

    #[test]
    fn test_begin_verification_is_idempotent() {
        let mut intent = make_intent();
        intent.begin_verification().unwrap();
        intent.begin_verification().unwrap();
        assert_eq!(intent.state, IntentState::Verifying);
    }

    #[test]
    fn test_failure_allowed_before_verification_concludes() {
        let mut intent = make_intent();
        intent.fail("provider reported failure").unwrap();
        assert_eq!(intent.state, IntentState::Failed);
        assert_eq!(
            intent.failure_reason.as_deref(),
            Some("provider reported failure")
        );

        let mut intent = make_intent();
        intent.begin_verification().unwrap();
        intent.fail("amount mismatch").unwrap();
        assert_eq!(intent.state, IntentState::Failed);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut intent = make_intent();
        intent.begin_verification().unwrap();
        intent.mark_verified().unwrap();
        intent.settle().unwrap();

        assert!(matches!(
            intent.fail("too late"),
            Err(GatewayError::InvalidStateTransition { .. })
        ));

        let mut failed = make_intent();
        failed.fail("dead").unwrap();
        assert!(matches!(
            failed.begin_verification(),
            Err(GatewayError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_settle_requires_verified() {
        let mut intent = make_intent();
        assert!(matches!(
            intent.settle(),
            Err(GatewayError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_amount_must_be_positive() {
        let result = PaymentIntent::new(
            VisitId::new_v7(),
            Money::zero(),
            "paystack",
            StaffId::new(),
        );
        assert!(matches!(
            result,
            Err(GatewayError::AmountNotPositive { .. })
        ));
    }
}
