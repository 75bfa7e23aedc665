//! Authentication and authorization
//!
//! Tokens carry the staff member's role and capability set. The middleware
//! turns validated claims into a [`core_kernel::Actor`], which is the only
//! identity the domain layer ever sees.

use chrono::{Duration, Utc};
use core_kernel::{Actor, Capability, CapabilitySet, StaffId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (staff ID)
    pub sub: String,
    /// Staff member's role
    pub role: String,
    /// Granted capabilities
    pub capabilities: CapabilitySet,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a staff ID")]
    MalformedSubject,
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `staff_id` - Staff identifier
/// * `role` - Staff member's role
/// * `capabilities` - Granted capabilities
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    staff_id: StaffId,
    role: &str,
    capabilities: CapabilitySet,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: staff_id.to_string(),
        role: role.to_string(),
        capabilities,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        if e.to_string().contains("ExpiredSignature") {
            AuthError::TokenExpired
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}

/// Builds the domain actor described by validated claims
///
/// The subject is accepted in either the prefixed display form or as a
/// bare UUID.
pub fn actor_from_claims(claims: &Claims) -> Result<Actor, AuthError> {
    let staff_id = claims
        .sub
        .parse::<StaffId>()
        .map_err(|_| AuthError::MalformedSubject)?;
    Ok(Actor::new(
        staff_id,
        claims.role.clone(),
        claims.capabilities.clone(),
    ))
}

/// Rejects the request unless the actor holds the given capability
pub fn require_capability(actor: &Actor, capability: Capability) -> Result<(), ApiError> {
    if actor.can(capability) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Role '{}' lacks the '{}' capability",
            actor.role(),
            capability
        )))
    }
}
