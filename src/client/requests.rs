//! Sending requests under an established session.

use serde::{Deserialize, de::DeserializeOwned};

use crate::envelope::{
    SESSION_HEADER,
    integrity::{IntegrityStatus, verify},
};
use crate::crypto::aes::{decrypt_hex, encrypt_hex};
use crate::error::{AppError, ErrorKind, Result};
use crate::handshake::EstablishedSession;

/// A response after signature checking and decryption.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    /// Plaintext JSON.
    pub body: Vec<u8>,
    /// `None` when the server answered with a plain JSON body.
    pub integrity: Option<IntegrityStatus>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Sends `body` to `path` and processes the response.
///
/// With `encrypted` the body is sealed under the session and the response is
/// decrypted; its signature is computed but decryption is what establishes
/// trust. Without it the signature must be present and valid.
pub(crate) async fn send(
    http: &reqwest::Client,
    base_url: &str,
    session: &EstablishedSession,
    path: &str,
    body: Option<Vec<u8>>,
    encrypted: bool,
    bearer: Option<&str>,
) -> Result<Reply> {
    let mut request = http.post(format!("{}{}", base_url, path));
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    if encrypted {
        let plaintext = body.unwrap_or_default();
        let sealed = encrypt_hex(&plaintext, &session.keys.encryption_key, &session.keys.nonce)?;
        request = request.header(SESSION_HEADER, session.session_id.as_str()).body(sealed);
    } else if let Some(plaintext) = body {
        request = request.body(plaintext);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let raw = response.bytes().await?.to_vec();

    if raw.first() == Some(&b'{') {
        return Ok(Reply {
            status,
            body: raw,
            integrity: None,
        });
    }

    // Content-Length, Date and X-Signature are left out of the signed bytes.
    let integrity = verify(&raw, path, &headers, &session.keys.signing_key);

    if !encrypted {
        integrity.require_valid()?;
        return Ok(Reply {
            status,
            body: raw,
            integrity: Some(integrity),
        });
    }

    if integrity != IntegrityStatus::Valid {
        tracing::warn!("⚠️  Response from {} has integrity {}", path, integrity.as_i8());
    }

    let text = std::str::from_utf8(&raw).map_err(|_| ErrorKind::CannotDecrypt)?;
    let plaintext = decrypt_hex(text.trim(), &session.keys.encryption_key, &session.keys.nonce)?;
    Ok(Reply {
        status,
        body: plaintext,
        integrity: Some(integrity),
    })
}

#[derive(Deserialize)]
struct EnvelopeHead {
    success: Option<bool>,
    error: Option<String>,
    context: Option<i64>,
}

/// Checks a sealed reply's `success` and `context` and parses it as `T`.
///
/// A reply with `now >= context` is stale and refused as `ContextExpired`.
pub fn parse_envelope<T: DeserializeOwned>(reply: &Reply, now: i64) -> Result<T> {
    let head: EnvelopeHead =
        sonic_rs::from_slice(&reply.body).map_err(|_| ErrorKind::InvalidJson)?;

    match head.success {
        None => return Err(ErrorKind::EmptyBody.into()),
        Some(false) => {
            return Err(AppError::Rejected {
                status: reply.status,
                message: head.error.unwrap_or_else(|| "failed request".to_string()),
            });
        }
        Some(true) => {}
    }

    let context = head.context.ok_or(ErrorKind::EmptyBody)?;
    if now >= context {
        return Err(ErrorKind::ContextExpired.into());
    }

    Ok(sonic_rs::from_slice(&reply.body).map_err(|_| ErrorKind::InvalidJson)?)
}

/// Parses a plain JSON reply, turning `{"success": false}` into a rejection.
pub fn parse_plain<T: DeserializeOwned>(reply: &Reply) -> Result<T> {
    if !reply.is_ok() {
        let head: Option<EnvelopeHead> = sonic_rs::from_slice(&reply.body).ok();
        return Err(AppError::Rejected {
            status: reply.status,
            message: head
                .and_then(|h| h.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&reply.body).into_owned()),
        });
    }
    Ok(sonic_rs::from_slice(&reply.body).map_err(|_| ErrorKind::InvalidJson)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Context {
        context: i64,
    }

    fn reply(body: &str) -> Reply {
        Reply {
            status: 200,
            body: body.as_bytes().to_vec(),
            integrity: Some(IntegrityStatus::Valid),
        }
    }

    #[test]
    fn fresh_envelope_parses() {
        let parsed: Context = parse_envelope(&reply(r#"{"success":true,"context":100}"#), 99).unwrap();
        assert_eq!(parsed.context, 100);
    }

    #[test]
    fn stale_envelope_is_context_expired() {
        let err = parse_envelope::<Context>(&reply(r#"{"success":true,"context":100}"#), 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextExpired);
    }

    #[test]
    fn missing_fields_are_empty_body() {
        let err = parse_envelope::<Context>(&reply(r#"{"context":100}"#), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyBody);
        let err = parse_envelope::<Context>(&reply(r#"{"success":true}"#), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyBody);
    }

    #[test]
    fn failure_carries_the_server_message() {
        let err = parse_envelope::<Context>(
            &reply(r#"{"success":false,"error":"License key has expired.","context":100}"#),
            0,
        )
        .unwrap_err();
        match err {
            AppError::Rejected { message, .. } => assert_eq!(message, "License key has expired."),
            other => panic!("unexpected error: {other}"),
        }
    }
}
