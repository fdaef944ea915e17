use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::crypto::aes::SecureKey;
use crate::error::{AppError, Result};

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 of `message` under `key`.
pub fn sign_hex(message: &[u8], key: &SecureKey) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Encryption(format!("HMAC key error: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a received signature against the expected one.
pub fn signatures_match(received: &[u8], expected: &[u8]) -> bool {
    received.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_128_hex_chars() {
        let sig = sign_hex(b"body/license", &SecureKey::new([7u8; 32])).unwrap();
        assert_eq!(sig.len(), 128);
    }

    #[test]
    fn signature_depends_on_key_and_message() {
        fn sign(m: &[u8], k: u8) -> String {
            sign_hex(m, &SecureKey::new([k; 32])).unwrap()
        }
        let a = sign(b"m", 1);
        assert_ne!(a, sign(b"m", 2));
        assert_ne!(a, sign(b"n", 1));
        assert_eq!(a, sign(b"m", 1));
    }

    #[test]
    fn comparison_rejects_length_and_content_mismatch() {
        assert!(signatures_match(b"abcd", b"abcd"));
        assert!(!signatures_match(b"abcd", b"abce"));
        assert!(!signatures_match(b"abc", b"abcd"));
    }
}
