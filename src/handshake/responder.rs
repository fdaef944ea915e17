use std::time::Duration;

use chrono::Utc;

use crate::crypto::{
    aes::{NONCE_SIZE, encrypt_hex},
    derive::derive_signing_key,
    dh::{DhKeyPair, session_key},
    keys::generate_session_id,
};
use crate::error::{ErrorKind, Result};
use crate::handshake::{
    EstablishedSession, FrameChannel, InitiatorHello, ResponderHello, RetryPolicy, SessionGrant,
    decode_nonce, decode_public, encode_b64, read_valid, send_json,
};
use crate::models::session::SessionKeys;
use crate::store::SessionStore;

/// Runs the server side of the hello exchange and persists the session.
///
/// The whole exchange must finish within `policy.timeout`. A key agreement
/// failure or a store failure ends the attempt; the caller should drop the
/// connection.
pub async fn respond<C>(
    channel: &mut C,
    sessions: &dyn SessionStore,
    session_ttl: Duration,
    policy: RetryPolicy,
) -> Result<EstablishedSession>
where
    C: FrameChannel + ?Sized,
{
    match tokio::time::timeout(policy.timeout, exchange(channel, sessions, session_ttl, policy)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️  Hello exchange timed out after {:?}", policy.timeout);
            Err(ErrorKind::InvalidHello.into())
        }
    }
}

async fn exchange<C>(
    channel: &mut C,
    sessions: &dyn SessionStore,
    session_ttl: Duration,
    policy: RetryPolicy,
) -> Result<EstablishedSession>
where
    C: FrameChannel + ?Sized,
{
    let pair = DhKeyPair::generate();
    send_json(
        channel,
        &ResponderHello {
            public: encode_b64(&pair.public_bytes()),
        },
    )
    .await?;

    let (peer_public, nonce): (Vec<u8>, [u8; NONCE_SIZE]) =
        read_valid(channel, policy.max_attempts, |hello: InitiatorHello| {
            Some((decode_public(&hello.public)?, decode_nonce(&hello.nonce)?))
        })
        .await?;

    let shared = pair.shared_secret(&peer_public)?;
    let encryption_key = session_key(&shared)?;

    let hmac_seed = Utc::now().timestamp();
    let signing_key = derive_signing_key(&encryption_key, hmac_seed);

    let session_id = generate_session_id();
    let keys = SessionKeys {
        encryption_key,
        nonce,
        signing_key,
    };

    sessions.put_new(&session_id, &keys, session_ttl).await?;

    let sealed_id = encrypt_hex(session_id.as_bytes(), &keys.encryption_key, &keys.nonce)?;
    send_json(
        channel,
        &SessionGrant {
            session_id: sealed_id,
            hmac_seed,
        },
    )
    .await?;

    tracing::info!("🤝 Session established (ttl {}s)", session_ttl.as_secs());
    Ok(EstablishedSession { session_id, keys })
}
