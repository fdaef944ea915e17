use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;

use crate::envelope::{
    SignWith,
    integrity::{SIGNATURE_HEADER, sign},
};
use crate::error::AppError;

/// Signs every response a handler marked with [`SignWith`].
///
/// Must be the outermost layer on the routes it covers: any header added
/// after this point would be missing from the signed message.
///
/// # Arguments
///
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The response, with `X-Signature` attached when it was marked.
pub async fn sign_responses(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(SignWith(key)) = response.extensions().get::<SignWith>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return AppError::Internal(format!("Cannot buffer response body: {}", e)).into_response();
        }
    };

    parts.extensions.remove::<SignWith>();
    let signature = match sign(&bytes, &path, &parts.headers, &key) {
        Ok(signature) => signature,
        Err(e) => return e.into_response(),
    };
    match HeaderValue::from_str(&signature) {
        Ok(value) => {
            parts.headers.insert(SIGNATURE_HEADER, value);
        }
        Err(e) => {
            return AppError::Internal(format!("Invalid signature header: {}", e)).into_response();
        }
    }

    tracing::debug!("✍️  Signed response for {}", path);
    Response::from_parts(parts, Body::from(bytes))
}
