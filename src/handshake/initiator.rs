use crate::crypto::{
    aes::{decrypt_hex, generate_nonce},
    derive::derive_signing_key,
    dh::{DhKeyPair, session_key},
};
use crate::error::{ErrorKind, Result};
use crate::handshake::{
    EstablishedSession, FrameChannel, InitiatorHello, ResponderHello, RetryPolicy, SessionGrant,
    decode_public, encode_b64, read_valid, send_json,
};
use crate::models::session::SessionKeys;

/// Runs the client side of the hello exchange.
///
/// Returns the decrypted session id together with the same key material the
/// responder stored.
pub async fn initiate<C>(channel: &mut C, policy: RetryPolicy) -> Result<EstablishedSession>
where
    C: FrameChannel + ?Sized,
{
    match tokio::time::timeout(policy.timeout, exchange(channel, policy)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️  Hello exchange timed out after {:?}", policy.timeout);
            Err(ErrorKind::InvalidHello.into())
        }
    }
}

async fn exchange<C>(channel: &mut C, policy: RetryPolicy) -> Result<EstablishedSession>
where
    C: FrameChannel + ?Sized,
{
    let pair = DhKeyPair::generate();
    let nonce = generate_nonce();

    send_json(
        channel,
        &InitiatorHello {
            public: encode_b64(&pair.public_bytes()),
            nonce: encode_b64(&nonce),
        },
    )
    .await?;

    let peer_public = read_valid(channel, policy.max_attempts, |hello: ResponderHello| {
        decode_public(&hello.public)
    })
    .await?;

    let shared = pair.shared_secret(&peer_public)?;
    let encryption_key = session_key(&shared)?;

    let grant = read_valid(channel, policy.max_attempts, |grant: SessionGrant| Some(grant)).await?;

    let id_bytes = decrypt_hex(&grant.session_id, &encryption_key, &nonce)?;
    let session_id = String::from_utf8(id_bytes).map_err(|_| ErrorKind::InvalidHello)?;
    let signing_key = derive_signing_key(&encryption_key, grant.hmac_seed);

    tracing::debug!("Hello exchange complete");
    Ok(EstablishedSession {
        session_id,
        keys: SessionKeys {
            encryption_key,
            nonce,
            signing_key,
        },
    })
}
