//! API error handling
//!
//! Every domain error funnels into [`ApiError`] so clients see one envelope
//! shape: `{ "error", "message", "details"? }`. Enforcement outcomes carry
//! structured `details` (denial kind, outstanding amount, unlock actions)
//! so clinical callers can render next steps instead of parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::PortError;
use domain_audit::AuditError;
use domain_billing::{BillingError, PaymentStatus, UnlockAction};
use domain_gateway::GatewayError;
use domain_wallet::WalletError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    #[error("Payment required: {message}")]
    PaymentRequired { message: String, details: Value },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ApiError {
    /// Creates a plain conflict with no structured details
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a conflict carrying a structured details payload
    pub fn conflict_with(message: impl Into<String>, details: Value) -> Self {
        ApiError::Conflict {
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "conflict", message, details)
            }
            ApiError::PaymentRequired { message, details } => (
                StatusCode::PAYMENT_REQUIRED,
                "payment_not_cleared",
                message,
                Some(details),
            ),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                None,
            ),
            ApiError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                msg,
                None,
            ),
            ApiError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg,
                None,
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            PortError::Validation { message, field } => match field {
                Some(field) => ApiError::Validation(format!("{field}: {message}")),
                None => ApiError::Validation(message),
            },
            PortError::Conflict { message } => ApiError::conflict(message),
            PortError::ImmutableRecord { record_kind, id } => ApiError::conflict_with(
                format!("{record_kind} {id} is append-only and cannot be modified"),
                json!({
                    "kind": "IMMUTABLE_RECORD",
                    "record_kind": record_kind,
                    "id": id,
                }),
            ),
            PortError::Connection { .. } | PortError::Timeout { .. } => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            PortError::Internal { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::AmountNotPositive { .. }
            | BillingError::Validation(_)
            | BillingError::MissingExternalReference
            | BillingError::MethodRequiresDedicatedFlow { .. }
            | BillingError::ForeignRecord { .. } => ApiError::Validation(err.to_string()),
            BillingError::VisitClosed { visit_id } => ApiError::conflict_with(
                format!("Visit {visit_id} is closed and accepts no further financial activity"),
                json!({ "kind": "VISIT_CLOSED", "visit_id": visit_id }),
            ),
            BillingError::OutstandingBalance {
                visit_id,
                outstanding,
                stored_status,
            } => {
                // The same unlock actions the payment gate advertises: settle
                // by payment or wallet, plus approval once a claim is pending.
                let mut unlock_actions =
                    vec![UnlockAction::CollectPayment, UnlockAction::DebitWallet];
                if stored_status == PaymentStatus::InsurancePending {
                    unlock_actions.push(UnlockAction::ApproveInsurance);
                }
                ApiError::PaymentRequired {
                    message: format!(
                        "Visit {visit_id} has {outstanding} outstanding and cannot be closed"
                    ),
                    details: json!({
                        "kind": "PAYMENT_NOT_CLEARED",
                        "visit_id": visit_id,
                        "outstanding": outstanding,
                        "stored_status": stored_status,
                        "unlock_actions": unlock_actions,
                    }),
                }
            }
            BillingError::InvalidStateTransition { .. }
            | BillingError::ChargeAlreadyReversed { .. }
            | BillingError::InsuranceAlreadyAttached { .. } => ApiError::conflict(err.to_string()),
            BillingError::NoInsurance { visit_id } => {
                ApiError::NotFound(format!("Visit {visit_id} has no insurance claim"))
            }
            BillingError::InsufficientWalletBalance {
                wallet_id,
                available,
                requested,
            } => ApiError::conflict_with(
                format!("Wallet {wallet_id} holds {available} but {requested} was requested"),
                json!({
                    "kind": "INSUFFICIENT_BALANCE",
                    "wallet_id": wallet_id,
                    "available": available,
                    "requested": requested,
                }),
            ),
            BillingError::Financial(message) => ApiError::Internal(message),
            BillingError::Storage(err) => err.into(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::AmountNotPositive { .. } | WalletError::Validation(_) => {
                ApiError::Validation(err.to_string())
            }
            WalletError::InsufficientBalance {
                available,
                requested,
            } => ApiError::conflict_with(
                format!("Insufficient balance: {available} available, {requested} requested"),
                json!({
                    "kind": "INSUFFICIENT_BALANCE",
                    "available": available,
                    "requested": requested,
                }),
            ),
            WalletError::LedgerIntegrity(message) => ApiError::Internal(message),
            WalletError::Financial(message) => ApiError::Internal(message),
            WalletError::Storage(err) => err.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AmountNotPositive { .. }
            | GatewayError::Validation(_)
            | GatewayError::MalformedEnvelope(_) => ApiError::Validation(err.to_string()),
            GatewayError::UnknownReference { reference } => {
                ApiError::NotFound(format!("No payment intent with reference {reference}"))
            }
            GatewayError::DuplicateReference { .. }
            | GatewayError::AmountMismatch { .. }
            | GatewayError::InvalidStateTransition { .. } => ApiError::conflict(err.to_string()),
            GatewayError::InvalidSignature => ApiError::Unauthorized,
            GatewayError::VerificationUnavailable { .. } => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            GatewayError::Storage(err) => err.into(),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Validation(message) => ApiError::Validation(message),
            AuditError::Storage(err) => err.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}
