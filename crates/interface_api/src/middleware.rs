//! API middleware

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use core_kernel::Actor;
use std::net::{IpAddr, SocketAddr};
use tracing::{info, warn};

use crate::auth;
use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Validates JWT tokens and attaches the resolved [`Actor`] to the request,
/// including the caller's network origin for the audit trail.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract token from Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            warn!("Missing or invalid Authorization header");
            return Err(ApiError::Unauthorized);
        }
    };

    let claims = match auth::validate_token(token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Token validation failed: {:?}", e);
            return Err(ApiError::Unauthorized);
        }
    };

    let actor = match auth::actor_from_claims(&claims) {
        Ok(actor) => actor,
        Err(e) => {
            warn!("Token claims rejected: {:?}", e);
            return Err(ApiError::Unauthorized);
        }
    };

    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    request
        .extensions_mut()
        .insert(actor.with_origin(ip, user_agent));
    Ok(next.run(request).await)
}

/// Prefers the forwarded header so proxies do not mask the caller, falling
/// back to the socket address.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Request logging middleware
///
/// Logs all API requests for monitoring and debugging
pub async fn request_log_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let actor = request
        .extensions()
        .get::<Actor>()
        .map(|a| format!("{} ({})", a.staff_id(), a.role()))
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        actor = %actor,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
