//! The hello exchange that establishes a session.
//!
//! Both roles write their own hello before reading the peer's, so the
//! exchange works over any full-duplex frame transport. Invalid frames are
//! answered with `{"error": ...}` and re-read, up to a bounded number of
//! attempts and within an overall deadline.

pub mod initiator;
pub mod responder;
pub mod ws;

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use garde::Validate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::Tunables;
use crate::crypto::aes::NONCE_SIZE;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::session::SessionKeys;

/// A bidirectional transport of whole binary frames.
#[async_trait]
pub trait FrameChannel: Send {
    async fn send_frame(&mut self, payload: Vec<u8>) -> Result<()>;

    /// The next frame, or `None` once the peer has closed.
    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Initiator's opening frame.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InitiatorHello {
    /// Base64 of the big-endian DH public value.
    #[garde(length(min = 1))]
    pub public: String,
    /// Base64 of the 12-byte session nonce.
    #[garde(length(min = 1))]
    pub nonce: String,
}

/// Responder's opening frame.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResponderHello {
    #[garde(length(min = 1))]
    pub public: String,
}

/// Responder's final frame.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SessionGrant {
    /// Hex AES-GCM ciphertext of the session id.
    #[garde(length(min = 1))]
    pub session_id: String,
    #[garde(skip)]
    pub hmac_seed: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

/// What either side holds once the exchange completes.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub session_id: String,
    pub keys: SessionKeys,
}

/// Bounds on how long a peer may keep sending bad frames.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl From<&Tunables> for RetryPolicy {
    fn from(t: &Tunables) -> Self {
        Self {
            max_attempts: t.handshake_max_attempts.max(1),
            timeout: t.handshake_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&Tunables::default())
    }
}

pub(crate) fn decode_public(encoded: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD
        .decode(encoded)
        .ok()
        .filter(|bytes| !bytes.is_empty())
}

pub(crate) fn decode_nonce(encoded: &str) -> Option<[u8; NONCE_SIZE]> {
    general_purpose::STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| bytes.as_slice().try_into().ok())
}

pub(crate) fn encode_b64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub(crate) async fn send_json<C, T>(channel: &mut C, frame: &T) -> Result<()>
where
    C: FrameChannel + ?Sized,
    T: Serialize,
{
    let payload = sonic_rs::to_vec(frame)?;
    channel.send_frame(payload).await
}

/// Reads frames until one parses as `T`, passes its field checks and is
/// accepted by `accept`.
///
/// Each rejected frame is answered with an error frame. Error frames from the
/// peer use up an attempt but are not answered.
pub(crate) async fn read_valid<C, T, R, F>(
    channel: &mut C,
    max_attempts: u32,
    mut accept: F,
) -> Result<R>
where
    C: FrameChannel + ?Sized,
    T: DeserializeOwned + Validate<Context = ()>,
    F: FnMut(T) -> Option<R> + Send,
{
    let mut attempts = 0;
    loop {
        let frame = channel
            .recv_frame()
            .await?
            .ok_or_else(|| AppError::Transport("peer closed during hello".to_string()))?;

        if let Ok(peer_error) = sonic_rs::from_slice::<ErrorFrame>(&frame) {
            tracing::warn!("⚠️  Peer reported a hello error: {}", peer_error.error);
        } else {
            let accepted = sonic_rs::from_slice::<T>(&frame)
                .ok()
                .filter(|msg| msg.validate().is_ok())
                .and_then(&mut accept);

            if let Some(value) = accepted {
                return Ok(value);
            }

            tracing::debug!("Rejected hello frame ({} bytes)", frame.len());
            send_json(
                channel,
                &ErrorFrame {
                    error: ErrorKind::InvalidHello.message().to_string(),
                },
            )
            .await?;
        }

        attempts += 1;
        if attempts >= max_attempts {
            return Err(ErrorKind::InvalidHello.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_must_be_twelve_bytes() {
        assert!(decode_nonce(&encode_b64(&[7u8; 12])).is_some());
        assert!(decode_nonce(&encode_b64(&[7u8; 11])).is_none());
        assert!(decode_nonce("not base64!").is_none());
    }

    #[test]
    fn empty_public_value_is_rejected() {
        assert!(decode_public("").is_none());
        assert_eq!(decode_public(&encode_b64(&[1, 2, 3])), Some(vec![1, 2, 3]));
    }

    #[test]
    fn hello_fields_are_required() {
        let hello: InitiatorHello = sonic_rs::from_str(r#"{"public":"","nonce":"AAAA"}"#).unwrap();
        assert!(hello.validate().is_err());

        let grant: std::result::Result<SessionGrant, _> = sonic_rs::from_str(r#"{"session_id":"ab"}"#);
        assert!(grant.is_err());
    }
}
