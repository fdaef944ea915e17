use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, ErrorKind},
    services::auth::decode_token,
    state::AppState,
};

/// Extracts the bearer token from the `Authorization` header.
///
/// # Arguments
///
/// * `request` - The incoming request.
///
/// # Returns
///
/// An `Option` containing the token if present.
fn extract_bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid HS512 access token.
///
/// The decoded [`Claims`](crate::services::auth::Claims) are attached to the
/// request extensions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or a plain 401 error.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_bearer_token(&request).ok_or_else(|| {
        tracing::warn!("❌ No bearer token found");
        AppError::Kind(ErrorKind::Unauthorized)
    })?;

    let claims = decode_token(&state.config.config().jwt_secret, token)?;
    tracing::debug!("✅ Token accepted for: {}", claims.username);

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
