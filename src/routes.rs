use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Request bodies are small JSON envelopes.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the full router.
///
/// Layer order matters: the cookie manager writes `Set-Cookie` before the
/// signing layer sees the response, so cookies are covered by the signature.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/hello", get(handlers::hello::hello))
        .route("/license", post(handlers::license::validate_license))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh));

    let protected_routes = Router::new()
        .route("/logout", post(handlers::auth::logout))
        .route("/create-owner", post(handlers::admin::create_owner))
        .route("/create-application", post(handlers::admin::create_application))
        .route("/create-license", post(handlers::admin::create_license))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CookieManagerLayer::new())
        .layer(from_fn(middleware_layer::integrity::sign_responses))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
