//! Webhook envelope parsing and signature verification
//!
//! The provider signs every delivery with HMAC-SHA256 over the raw request
//! body and sends the hex digest in the `X-Webhook-Signature` header.
//! Signature verification runs on the raw bytes before anything is parsed
//! or any store is touched.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

/// Outcome the provider reports for a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    Success,
    Failed,
}

/// Parsed webhook delivery from the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub external_reference: String,
    pub amount: Decimal,
    pub status: WebhookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Computes the hex-encoded HMAC-SHA256 digest of a payload
pub fn compute_signature(raw_body: &[u8], secret: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::validation(format!("Invalid webhook secret: {}", e)))?;
    mac.update(raw_body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a provider signature against the raw request body
///
/// The comparison happens inside the MAC in constant time. A signature
/// that is not valid hex fails the same way a wrong one does.
pub fn verify_signature(
    raw_body: &[u8],
    signature: &str,
    secret: &str,
) -> Result<(), GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::validation(format!("Invalid webhook secret: {}", e)))?;
    mac.update(raw_body);
    let provided = hex::decode(signature.trim()).map_err(|_| GatewayError::InvalidSignature)?;
    mac.verify_slice(&provided)
        .map_err(|_| GatewayError::InvalidSignature)
}

/// Parses a verified webhook body into an envelope
pub fn parse_envelope(raw_body: &[u8]) -> Result<WebhookEnvelope, GatewayError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

    if envelope.external_reference.trim().is_empty() {
        return Err(GatewayError::validation(
            "External reference cannot be empty",
        ));
    }
    if envelope.amount <= Decimal::ZERO {
        return Err(GatewayError::AmountNotPositive {
            amount: envelope.amount,
        });
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_test_4f2a";

    fn body(status: &str) -> Vec<u8> {
        format!(
            r#"{{"external_reference":"gw_9c1d2e3f","amount":"1500.00","status":"{}"}}"#,
            status
        )
        .into_bytes()
    }

    #[test]
    fn test_signature_round_trip() {
        let payload = body("SUCCESS");
        let signature = compute_signature(&payload, SECRET).unwrap();

        assert!(verify_signature(&payload, &signature, SECRET).is_ok());
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let payload = body("SUCCESS");
        let signature = compute_signature(&payload, SECRET).unwrap();
        let tampered = body("FAILED");

        let result = verify_signature(&tampered, &signature, SECRET);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let payload = body("SUCCESS");
        let signature = compute_signature(&payload, SECRET).unwrap();

        let result = verify_signature(&payload, &signature, "whsec_other");
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let payload = body("SUCCESS");

        let result = verify_signature(&payload, "not-hex-at-all", SECRET);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_parse_success_envelope() {
        let envelope = parse_envelope(&body("SUCCESS")).unwrap();

        assert_eq!(envelope.external_reference, "gw_9c1d2e3f");
        assert_eq!(envelope.amount, dec!(1500.00));
        assert_eq!(envelope.status, WebhookStatus::Success);
        assert!(envelope.reason.is_none());
    }

    #[test]
    fn test_parse_failed_envelope_with_reason() {
        let raw = br#"{"external_reference":"gw_9c1d2e3f","amount":"1500.00","status":"FAILED","reason":"card_declined"}"#;
        let envelope = parse_envelope(raw).unwrap();

        assert_eq!(envelope.status, WebhookStatus::Failed);
        assert_eq!(envelope.reason.as_deref(), Some("card_declined"));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let result = parse_envelope(b"{not json");
        assert!(matches!(result, Err(GatewayError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_parse_rejects_non_positive_amount() {
        let raw = br#"{"external_reference":"gw_9c1d2e3f","amount":"0.00","status":"SUCCESS"}"#;
        let result = parse_envelope(raw);
        assert!(matches!(
            result,
            Err(GatewayError::AmountNotPositive { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_blank_reference() {
        let raw = br#"{"external_reference":"  ","amount":"10.00","status":"SUCCESS"}"#;
        let result = parse_envelope(raw);
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_own_signature_always_verifies(
                payload in proptest::collection::vec(any::<u8>(), 0..512),
                secret in "[a-zA-Z0-9_]{8,40}",
            ) {
                let signature = compute_signature(&payload, &secret).unwrap();
                prop_assert!(verify_signature(&payload, &signature, &secret).is_ok());
            }

            #[test]
            fn prop_flipped_byte_never_verifies(
                payload in proptest::collection::vec(any::<u8>(), 1..512),
                index in 0usize..512,
                secret in "[a-zA-Z0-9_]{8,40}",
            ) {
                let signature = compute_signature(&payload, &secret).unwrap();
                let mut tampered = payload.clone();
                let i = index % tampered.len();
                tampered[i] ^= 0x01;
                prop_assert!(verify_signature(&tampered, &signature, &secret).is_err());
            }
        }
    }
}
