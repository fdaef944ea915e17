use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, ErrorKind, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    ///
    /// # Arguments
    ///
    /// * `key` - A 32-byte array representing the AES-256 key.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Copies a key out of a slice, failing when the slice is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| AppError::Encryption(format!("Invalid key size: {}", bytes.len())))?;
        Ok(Self(key))
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureKey(..)")
    }
}

/// Generates a new random AES-GCM nonce.
///
/// # Returns
///
/// A 12-byte array representing the nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seals `plaintext` with AES-256-GCM and returns the hex-encoded ciphertext.
///
/// No associated data is bound. The caller supplies the nonce; sessions reuse
/// one nonce for every message in both directions, which breaks GCM's
/// guarantees once more than one message is sealed. The wire format depends
/// on it, so it is kept and flagged here.
///
/// # Arguments
///
/// * `plaintext` - The data to encrypt.
/// * `key` - The AES-256 key.
/// * `nonce` - The 12-byte nonce.
pub fn encrypt_hex(plaintext: &[u8], key: &SecureKey, nonce: &[u8; NONCE_SIZE]) -> Result<String> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(*nonce);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(hex::encode(ciphertext))
}

/// Opens a hex-encoded AES-256-GCM ciphertext.
///
/// Bad hex and tag mismatches both yield [`ErrorKind::CannotDecrypt`].
pub fn decrypt_hex(ciphertext_hex: &str, key: &SecureKey, nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
    let ciphertext = hex::decode(ciphertext_hex.trim()).map_err(|_| ErrorKind::CannotDecrypt)?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(*nonce);

    cipher
        .decrypt(&nonce, ciphertext.as_slice())
        .map_err(|_| AppError::Kind(ErrorKind::CannotDecrypt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> SecureKey {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        SecureKey::new(key)
    }

    #[test]
    fn seal_then_open_returns_plaintext() {
        let key = random_key();
        let nonce = generate_nonce();
        for message in [&b""[..], b"x", b"{\"success\":true}", &[0u8; 4096][..]] {
            let sealed = encrypt_hex(message, &key, &nonce).unwrap();
            assert_eq!(decrypt_hex(&sealed, &key, &nonce).unwrap(), message);
        }
    }

    #[test]
    fn ciphertext_is_lowercase_hex_with_tag() {
        let key = random_key();
        let sealed = encrypt_hex(b"abc", &key, &generate_nonce()).unwrap();
        assert_eq!(sealed.len(), (3 + 16) * 2);
        assert!(sealed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tampered_ciphertext_cannot_be_decrypted() {
        let key = random_key();
        let nonce = generate_nonce();
        let mut sealed = encrypt_hex(b"license", &key, &nonce).unwrap().into_bytes();
        sealed[0] = if sealed[0] == b'0' { b'1' } else { b'0' };
        let sealed = String::from_utf8(sealed).unwrap();

        let err = decrypt_hex(&sealed, &key, &nonce).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotDecrypt);
    }

    #[test]
    fn non_hex_input_cannot_be_decrypted() {
        let err = decrypt_hex("not-hex!", &random_key(), &generate_nonce()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotDecrypt);
    }

    #[test]
    fn wrong_key_cannot_decrypt() {
        let nonce = generate_nonce();
        let sealed = encrypt_hex(b"secret", &random_key(), &nonce).unwrap();
        assert!(decrypt_hex(&sealed, &random_key(), &nonce).is_err());
    }
}
