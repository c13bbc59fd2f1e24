//! Authentication middleware
//!
//! Bearer key authentication for the `/api` endpoints.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

/// API key authentication middleware
///
/// No key configured means every request passes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if validate_api_key(provided, state.config.api.key.as_deref()) {
        Ok(next.run(request).await)
    } else {
        debug!(path = %request.uri().path(), "Rejected request with missing or wrong API key");
        Err(ApiError::Unauthorized)
    }
}

/// Simple API key validation
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(p), Some(e)) => p == e,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}
