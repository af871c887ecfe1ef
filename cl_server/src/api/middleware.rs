//! Shared-secret authentication for the chat front-end.
//!
//! The bot is the only client. It presents `Authorization: Bearer <token>`
//! and the token is compared in constant time.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use super::{AppState, ErrorResponse};
use crate::logging::log_security_event;

/// Reject `/api/v1` calls that do not carry the configured token.
///
/// Pass-through when no token is configured.
pub async fn api_token_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token_matches(token, expected) => next.run(request).await,
        Some(_) => {
            log_security_event("bad_api_token", None, "Bearer token mismatch");
            unauthorized()
        }
        None => {
            log_security_event("missing_api_token", None, "No bearer token presented");
            unauthorized()
        }
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Unauthorized".to_string(),
            code: "unauthorized",
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret-token", "secret-token"));
        assert!(!token_matches("secret-tokem", "secret-token"));
        assert!(!token_matches("secret", "secret-token"));
        assert!(!token_matches("", "secret-token"));
    }
}
