use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aes::{SecureKey, NONCE_SIZE};
use crate::error::{AppError, Result};

/// Key material for one session.
///
/// Exactly one triple exists per session id. The nonce is the initiator's
/// hello nonce and is reused for every message sealed under the session.
#[derive(Clone, Debug)]
pub struct SessionKeys {
    pub encryption_key: SecureKey,
    pub nonce: [u8; NONCE_SIZE],
    pub signing_key: SecureKey,
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.nonce.zeroize();
    }
}

/// The form a session takes inside the key-value store.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredSession {
    pub encryption_key: String,
    pub hash_key: String,
    pub nonce: String,
}

impl From<&SessionKeys> for StoredSession {
    fn from(keys: &SessionKeys) -> Self {
        Self {
            encryption_key: general_purpose::STANDARD.encode(keys.encryption_key.as_bytes()),
            hash_key: general_purpose::STANDARD.encode(keys.signing_key.as_bytes()),
            nonce: general_purpose::STANDARD.encode(keys.nonce),
        }
    }
}

impl TryFrom<&StoredSession> for SessionKeys {
    type Error = AppError;

    fn try_from(stored: &StoredSession) -> Result<Self> {
        let decode = |field: &str, value: &str| {
            general_purpose::STANDARD
                .decode(value)
                .map_err(|_| AppError::Internal(format!("Corrupt session field: {}", field)))
        };

        let mut encryption_key = decode("encryption_key", &stored.encryption_key)?;
        let mut signing_key = decode("hash_key", &stored.hash_key)?;
        let nonce_bytes = decode("nonce", &stored.nonce)?;

        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| AppError::Internal("Corrupt session nonce".to_string()))?;

        let keys = SessionKeys {
            encryption_key: SecureKey::from_slice(&encryption_key)?,
            nonce,
            signing_key: SecureKey::from_slice(&signing_key)?,
        };

        encryption_key.zeroize();
        signing_key.zeroize();
        Ok(keys)
    }
}
