//! Webhook reconciliation
//!
//! Turns a verified provider delivery into at most one settled gateway
//! payment. The reconciler trusts nothing in the envelope beyond the
//! reference: the amount is checked against the intent, and the
//! verification marker decides whether this delivery is the first.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use core_kernel::{Actor, Money, PaymentId, VisitId};

use crate::error::GatewayError;
use crate::intent::PaymentIntent;
use crate::ports::GatewayStore;
use crate::webhook::{WebhookEnvelope, WebhookStatus};

/// Outcome of processing one webhook delivery
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verification {
    /// First delivery for this reference; the payment was recorded
    VerifiedOnce {
        intent: PaymentIntent,
        payment_id: PaymentId,
    },
    /// The reference was settled by an earlier delivery; nothing written
    AlreadyVerified {
        intent: PaymentIntent,
        payment_id: PaymentId,
    },
    /// Verification concluded negatively; the intent is failed
    Failed { intent: PaymentIntent, reason: String },
}

impl Verification {
    /// The payment recorded for this reference, when one exists
    pub fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Verification::VerifiedOnce { payment_id, .. } => Some(*payment_id),
            Verification::AlreadyVerified { payment_id, .. } => Some(*payment_id),
            Verification::Failed { .. } => None,
        }
    }
}

/// Service that reconciles provider deliveries against payment intents
pub struct GatewayReconciler {
    store: Arc<dyn GatewayStore>,
    verification_timeout: Duration,
}

impl GatewayReconciler {
    /// Ceiling on one delivery's verification work
    pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new reconciler over a gateway store
    pub fn new(store: Arc<dyn GatewayStore>) -> Self {
        Self {
            store,
            verification_timeout: Self::DEFAULT_VERIFICATION_TIMEOUT,
        }
    }

    /// Replaces the default verification timeout, usually from configuration
    pub fn with_verification_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout = timeout;
        self
    }

    /// Creates a payment intent for a visit
    pub async fn create_intent(
        &self,
        visit_id: VisitId,
        amount: Money,
        provider: &str,
        actor: &Actor,
    ) -> Result<PaymentIntent, GatewayError> {
        let intent = self
            .store
            .create_intent(visit_id, amount, provider, actor)
            .await?;
        tracing::info!(
            visit_id = %intent.visit_id,
            reference = %intent.external_reference,
            amount = %intent.amount,
            "Payment intent created"
        );
        Ok(intent)
    }

    /// Processes one parsed webhook delivery
    ///
    /// The sequence is: duplicate check via the verification marker,
    /// then a persisted move to VERIFYING, then the amount check, then
    /// atomic settlement. Reported failures and amount mismatches fail
    /// the intent definitively; both are final answers, not retries.
    /// The whole sequence runs under the verification timeout; cutting
    /// it off leaves no payment behind, so the provider can redeliver.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnknownReference` when no intent carries
    /// the envelope's reference,
    /// `GatewayError::VerificationUnavailable` when the timeout
    /// expires, and storage errors from the underlying adapter. A lost
    /// settlement race against a concurrent delivery of the same
    /// reference is not an error; it resolves to
    /// `Verification::AlreadyVerified`.
    pub async fn process(
        &self,
        envelope: &WebhookEnvelope,
        actor: &Actor,
    ) -> Result<Verification, GatewayError> {
        let reference = envelope.external_reference.as_str();
        let attempt = self.reconcile(envelope, actor);
        match tokio::time::timeout(self.verification_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(reference, "Webhook verification timed out");
                Err(GatewayError::VerificationUnavailable {
                    message: format!(
                        "verification of {} did not finish within {:?}",
                        reference, self.verification_timeout
                    ),
                })
            }
        }
    }

    async fn reconcile(
        &self,
        envelope: &WebhookEnvelope,
        actor: &Actor,
    ) -> Result<Verification, GatewayError> {
        let reference = envelope.external_reference.as_str();

        if let Some(marker) = self.store.verification_marker(reference).await? {
            let intent = self.store.intent_by_reference(reference).await?;
            tracing::info!(reference, "Duplicate webhook delivery suppressed");
            return Ok(Verification::AlreadyVerified {
                intent,
                payment_id: marker.payment_id,
            });
        }

        if envelope.status == WebhookStatus::Failed {
            let reason = envelope
                .reason
                .clone()
                .unwrap_or_else(|| "Provider reported failure".to_string());
            let intent = self.store.record_failure(reference, &reason).await?;
            tracing::warn!(reference, %reason, "Gateway payment failed");
            return Ok(Verification::Failed { intent, reason });
        }

        let intent = self.store.begin_verification(reference).await?;

        let reported = Money::new(envelope.amount);
        if reported != intent.amount {
            let reason = format!(
                "Provider reported {} against an intent for {}",
                reported, intent.amount
            );
            let intent = self.store.record_failure(reference, &reason).await?;
            tracing::warn!(reference, %reason, "Gateway amount mismatch");
            return Ok(Verification::Failed { intent, reason });
        }

        match self.store.settle_verified(reference, actor).await {
            Ok(outcome) => {
                tracing::info!(
                    reference,
                    visit_id = %outcome.intent.visit_id,
                    payment_id = %outcome.payment_id,
                    "Gateway payment verified and recorded"
                );
                Ok(Verification::VerifiedOnce {
                    intent: outcome.intent,
                    payment_id: outcome.payment_id,
                })
            }
            Err(e) if e.is_conflict() => {
                // A concurrent delivery of the same reference won the
                // marker; report its settlement instead of an error.
                match self.store.verification_marker(reference).await? {
                    Some(marker) => {
                        let intent = self.store.intent_by_reference(reference).await?;
                        tracing::info!(reference, "Concurrent delivery already settled");
                        Ok(Verification::AlreadyVerified {
                            intent,
                            payment_id: marker.payment_id,
                        })
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
