//! HTTP middleware implementations

use crate::api::handlers::error_response;
use crate::app::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use types::BridgeError;

/// Require `Authorization: Bearer <api_token>` when a token is configured
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.security.api_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let rejection = match presented {
        Some(token) if token == expected => None,
        Some(_) => Some("Invalid API token"),
        None => Some("Missing bearer token"),
    };

    match rejection {
        None => next.run(request).await,
        Some(message) => unauthorized(message),
    }
}

fn unauthorized(message: &str) -> Response {
    tracing::debug!(reason = message, "Rejected unauthenticated request");
    let (status, body) = error_response(&BridgeError::Authentication(message.to_string()));
    (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
}
