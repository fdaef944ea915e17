use axum::{extract::State, response::Response, Json};
use serde::Serialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    envelope::{Rejection, Sealed},
    error::{ErrorKind, Result},
    services::auth as auth_service,
    state::AppState,
    validation::messages::Credentials,
};

/// Name of the cookie holding the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Sealed reply to a registration.
#[derive(Serialize)]
pub struct Registered {
    pub success: bool,
    pub id: String,
    pub context: i64,
}

/// Sealed reply to a login.
#[derive(Serialize)]
pub struct LoggedIn {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    pub context: i64,
}

/// Plain reply to a refresh.
#[derive(Serialize)]
pub struct Refreshed {
    pub token: String,
}

/// Plain reply to a logout.
#[derive(Serialize)]
pub struct LoggedOut {
    pub success: bool,
}

/// Creates the HTTP-only cookie that carries the refresh token.
fn refresh_cookie(value: String, max_age_minutes: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, value);

    let is_production = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "development".to_string()) == "production";
    if is_production {
        cookie.set_secure(true);
    }

    cookie.set_http_only(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Strict);
    cookie.set_max_age(Duration::minutes(max_age_minutes));
    cookie.set_path("/");
    cookie
}

/// Handles `POST /register`.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Sealed { session, body }: Sealed<Credentials>,
) -> std::result::Result<Response, Rejection> {
    tracing::info!("📝 Register attempt for: {}", body.username);

    let api_key = state.config.config().api_key.as_deref().map(String::as_str);
    let account = auth_service::register(&*state.records, &body, api_key)
        .await
        .map_err(|e| session.reject(e))?;

    session.seal(&Registered {
        success: true,
        id: account.id.to_string(),
        context: session.context,
    })
}

/// Handles `POST /login`.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Sealed { session, body }: Sealed<Credentials>,
) -> std::result::Result<Response, Rejection> {
    tracing::info!("🔐 Login attempt for: {}", body.username);

    let tunables = state.config.tunables();
    let pair = auth_service::login(
        &*state.records,
        &state.config.config().jwt_secret,
        &tunables,
        &body,
    )
    .await
    .map_err(|e| session.reject(e))?;

    cookies.add(refresh_cookie(
        pair.refresh_token.clone(),
        tunables.refresh_token_minutes,
    ));

    session.seal(&LoggedIn {
        success: true,
        token: pair.token,
        refresh_token: pair.refresh_token,
        context: session.context,
    })
}

/// Handles `POST /refresh`. Plain JSON; the refresh token is the credential.
#[axum::debug_handler]
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> Result<Json<Refreshed>> {
    let refresh_token = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ErrorKind::NoRefreshToken)?;

    let token = auth_service::refresh(
        &*state.records,
        &state.config.config().jwt_secret,
        &state.config.tunables(),
        &refresh_token,
    )
    .await?;

    tracing::debug!("🔄 Access token refreshed");
    Ok(Json(Refreshed { token }))
}

/// Handles `POST /logout`. Requires a bearer token.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Json<LoggedOut>> {
    let refresh_token = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ErrorKind::NoRefreshToken)?;

    auth_service::logout(&*state.records, &refresh_token).await?;

    let mut cleared = Cookie::new(REFRESH_COOKIE, "");
    cleared.set_max_age(Duration::seconds(0));
    cleared.set_path("/");
    cookies.add(cleared);

    Ok(Json(LoggedOut { success: true }))
}
