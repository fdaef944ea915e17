use axum::{extract::State, response::Response, Extension};
use serde::Serialize;

use crate::{
    envelope::{Rejection, Sealed},
    services::{admin as admin_service, auth::Claims},
    state::AppState,
    validation::messages::{CreateApplication, CreateLicense, CreateOwner},
};

/// Sealed reply carrying the id of a created record.
#[derive(Serialize)]
pub struct Created {
    pub success: bool,
    pub id: String,
    pub context: i64,
}

/// Sealed reply carrying a freshly minted license key.
#[derive(Serialize)]
pub struct IssuedLicense {
    pub success: bool,
    pub key: String,
    pub context: i64,
}

/// Handles `POST /create-owner`. Admin tokens only.
#[axum::debug_handler]
pub async fn create_owner(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Sealed { session, body }: Sealed<CreateOwner>,
) -> Result<Response, Rejection> {
    let owner = admin_service::create_owner(&*state.records, &claims, &body)
        .await
        .map_err(|e| session.reject(e))?;

    session.seal(&Created {
        success: true,
        id: owner.id.to_string(),
        context: session.context,
    })
}

/// Handles `POST /create-application`.
#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Sealed { session, body }: Sealed<CreateApplication>,
) -> Result<Response, Rejection> {
    let app = admin_service::create_application(&*state.records, &claims, &body)
        .await
        .map_err(|e| session.reject(e))?;

    session.seal(&Created {
        success: true,
        id: app.id.to_string(),
        context: session.context,
    })
}

/// Handles `POST /create-license`.
#[axum::debug_handler]
pub async fn create_license(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Sealed { session, body }: Sealed<CreateLicense>,
) -> Result<Response, Rejection> {
    let license = admin_service::create_license(&*state.records, &claims, &body)
        .await
        .map_err(|e| session.reject(e))?;

    session.seal(&IssuedLicense {
        success: true,
        key: license.key,
        context: session.context,
    })
}
