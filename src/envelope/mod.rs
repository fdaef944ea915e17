//! Encrypted request and response bodies under a handshake session.

pub mod integrity;

use axum::{
    extract::{FromRequest, Request},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use garde::Validate;
use serde::{Serialize, de::DeserializeOwned};

use crate::crypto::aes::{SecureKey, decrypt_hex, encrypt_hex};
use crate::error::{AppError, ErrorKind, Result};
use crate::models::session::SessionKeys;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";

/// Marks a response for signing by the integrity layer.
#[derive(Clone)]
pub struct SignWith(pub SecureKey);

/// A live session resolved from `X-Session-Id`.
#[derive(Clone)]
pub struct SessionContext {
    pub id: String,
    pub keys: SessionKeys,
    /// Unix time after which replies sealed now must be discarded.
    pub context: i64,
}

impl SessionContext {
    /// Resolves the session named by the request headers.
    pub async fn resolve(state: &AppState, headers: &http::HeaderMap) -> Result<Self> {
        let id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ErrorKind::NoSession)?;

        let keys = state
            .sessions
            .get(id)
            .await?
            .ok_or(ErrorKind::NoSession)?;

        let context = Utc::now().timestamp() + state.config.tunables().allowed_context_secs;
        Ok(Self {
            id: id.to_string(),
            keys,
            context,
        })
    }

    /// Decrypts a request body. An empty plaintext is `EmptyBody`.
    pub fn open(&self, body: &str) -> Result<Vec<u8>> {
        if body.trim().is_empty() {
            return Err(ErrorKind::EmptyBody.into());
        }
        let plaintext = decrypt_hex(body, &self.keys.encryption_key, &self.keys.nonce)?;
        if plaintext.is_empty() {
            return Err(ErrorKind::EmptyBody.into());
        }
        Ok(plaintext)
    }

    /// Encrypts `payload` as the response body and marks it for signing.
    pub fn seal<T: Serialize>(&self, payload: &T) -> std::result::Result<Response, Rejection> {
        self.try_seal(payload).map_err(Rejection::plain)
    }

    fn try_seal<T: Serialize>(&self, payload: &T) -> Result<Response> {
        let json = sonic_rs::to_vec(payload)?;
        let body = encrypt_hex(&json, &self.keys.encryption_key, &self.keys.nonce)?;

        let mut response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response();
        response
            .extensions_mut()
            .insert(SignWith(self.keys.signing_key.clone()));
        Ok(response)
    }

    /// Wraps an error so it is answered under this session.
    pub fn reject(&self, error: impl Into<AppError>) -> Rejection {
        Rejection {
            session: Some(self.clone()),
            error: error.into(),
        }
    }
}

/// A failed secure request.
///
/// With a session the error goes back as a sealed `{success: false}` envelope
/// with status 200; without one it is the plain error response.
pub struct Rejection {
    session: Option<SessionContext>,
    error: AppError,
}

impl Rejection {
    pub fn plain(error: AppError) -> Self {
        Self {
            session: None,
            error,
        }
    }
}

impl<E: Into<AppError>> From<E> for Rejection {
    fn from(error: E) -> Self {
        Rejection::plain(error.into())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: &'a str,
    context: i64,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let Some(session) = self.session else {
            return self.error.into_response();
        };

        self.error.log();
        let envelope = ErrorEnvelope {
            success: false,
            error: self.error.kind().message(),
            context: session.context,
        };
        match session.try_seal(&envelope) {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
}

/// A decrypted, parsed and field-checked request body.
pub struct Sealed<T> {
    pub session: SessionContext,
    pub body: T,
}

impl<T> FromRequest<AppState> for Sealed<T>
where
    T: DeserializeOwned + Validate<Context = ()> + Send,
{
    type Rejection = Rejection;

    async fn from_request(req: Request, state: &AppState) -> std::result::Result<Self, Rejection> {
        let session = SessionContext::resolve(state, req.headers()).await?;

        let body = String::from_request(req, state)
            .await
            .map_err(|_| session.reject(ErrorKind::EmptyBody))?;

        let plaintext = session.open(&body).map_err(|e| session.reject(e))?;
        let parsed = parse_body::<T>(&plaintext).map_err(|e| session.reject(e))?;

        tracing::debug!("🔓 Opened request under session");
        Ok(Sealed {
            session,
            body: parsed,
        })
    }
}

/// Parses a decrypted body and checks its required fields.
pub fn parse_body<T>(plaintext: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
{
    let value: T = sonic_rs::from_slice(plaintext).map_err(|_| ErrorKind::InvalidJson)?;
    value.validate().map_err(|report| {
        tracing::debug!("Rejected request fields: {}", report);
        ErrorKind::EmptyFields
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes::generate_nonce;

    #[derive(Debug, serde::Deserialize, Validate)]
    struct Probe {
        #[garde(length(min = 1))]
        name: String,
    }

    fn session() -> SessionContext {
        SessionContext {
            id: "s".to_string(),
            keys: SessionKeys {
                encryption_key: SecureKey::new([8u8; 32]),
                nonce: generate_nonce(),
                signing_key: SecureKey::new([9u8; 32]),
            },
            context: 100,
        }
    }

    #[test]
    fn sealed_body_opens_with_the_same_session() {
        let s = session();
        let hex = encrypt_hex(br#"{"name":"x"}"#, &s.keys.encryption_key, &s.keys.nonce).unwrap();
        let probe: Probe = parse_body(&s.open(&hex).unwrap()).unwrap();
        assert_eq!(probe.name, "x");
    }

    #[test]
    fn empty_plaintext_is_empty_body() {
        let s = session();
        let hex = encrypt_hex(b"", &s.keys.encryption_key, &s.keys.nonce).unwrap();
        assert_eq!(s.open(&hex).unwrap_err().kind(), ErrorKind::EmptyBody);
        assert_eq!(s.open("  ").unwrap_err().kind(), ErrorKind::EmptyBody);
    }

    #[test]
    fn blank_required_field_is_empty_fields() {
        let err = parse_body::<Probe>(br#"{"name":""}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyFields);
        let err = parse_body::<Probe>(b"{nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidJson);
    }

    #[test]
    fn session_rejection_is_sealed_with_status_ok() {
        let s = session();
        let response = s.reject(ErrorKind::ExpiredLicense).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<SignWith>().is_some());

        let plain = Rejection::plain(ErrorKind::InvalidOwner.into()).into_response();
        assert_eq!(plain.status(), StatusCode::BAD_REQUEST);
    }
}
