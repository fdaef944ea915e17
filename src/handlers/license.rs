use axum::{extract::State, response::Response};
use chrono::Utc;
use serde::Serialize;

use crate::{
    envelope::{Rejection, Sealed},
    services::license as license_service,
    state::AppState,
    validation::messages::LicenseValidate,
};

/// The sealed verdict of a successful validation.
#[derive(Serialize)]
pub struct LicenseVerdict {
    pub success: bool,
    pub context: i64,
}

/// Handles `POST /license`.
///
/// The request is its own proof of identity: no bearer token, only a live
/// session. Clients are expected to open a fresh session per validation.
#[axum::debug_handler]
pub async fn validate_license(
    State(state): State<AppState>,
    Sealed { session, body }: Sealed<LicenseValidate>,
) -> Result<Response, Rejection> {
    license_service::validate_license(&*state.records, &body, Utc::now().timestamp())
        .await
        .map_err(|e| session.reject(e))?;

    session.seal(&LicenseVerdict {
        success: true,
        context: session.context,
    })
}
