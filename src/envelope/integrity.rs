//! Response integrity signatures.
//!
//! The signed message is `body ++ path ++ keys ++ values`, where `keys` is the
//! concatenation of the sorted header names and `values` the concatenation of
//! the sorted header values. The two lists are sorted independently, so a
//! value is not kept next to its name.

use http::HeaderMap;

use crate::crypto::aes::SecureKey;
use crate::crypto::hmac::{sign_hex, signatures_match};
use crate::error::{ErrorKind, Result};

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Headers left out of the signed message on both sides.
pub const UNSIGNED_HEADERS: [&str; 3] = ["content-length", "date", SIGNATURE_HEADER];

/// Outcome of checking a response signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// No signature header was present.
    Missing,
    /// A signature was present and did not match.
    Invalid,
    Valid,
}

impl IntegrityStatus {
    /// Numeric form: `-1`, `0` or `1`.
    pub fn as_i8(self) -> i8 {
        match self {
            IntegrityStatus::Missing => -1,
            IntegrityStatus::Invalid => 0,
            IntegrityStatus::Valid => 1,
        }
    }

    /// Turns anything but `Valid` into the matching error.
    pub fn require_valid(self) -> Result<()> {
        match self {
            IntegrityStatus::Valid => Ok(()),
            IntegrityStatus::Invalid => Err(ErrorKind::InvalidIntegrity.into()),
            IntegrityStatus::Missing => Err(ErrorKind::NoIntegrity.into()),
        }
    }
}

/// Builds the byte string that gets signed.
///
/// Header names are the lowercase forms `http` stores them in. When a header
/// repeats, only its first value is used.
pub fn canonical_bytes(body: &[u8], path: &str, headers: &HeaderMap) -> Vec<u8> {
    let mut keys: Vec<&[u8]> = Vec::new();
    let mut values: Vec<&[u8]> = Vec::new();

    for name in headers.keys() {
        if UNSIGNED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        keys.push(name.as_str().as_bytes());
        if let Some(value) = headers.get(name) {
            values.push(value.as_bytes());
        }
    }

    keys.sort_unstable();
    values.sort_unstable();

    let mut out = Vec::with_capacity(
        body.len()
            + path.len()
            + keys.iter().map(|k| k.len()).sum::<usize>()
            + values.iter().map(|v| v.len()).sum::<usize>(),
    );
    out.extend_from_slice(body);
    out.extend_from_slice(path.as_bytes());
    keys.iter().for_each(|k| out.extend_from_slice(k));
    values.iter().for_each(|v| out.extend_from_slice(v));
    out
}

/// Hex HMAC-SHA512 over the canonical bytes.
pub fn sign(body: &[u8], path: &str, headers: &HeaderMap, key: &SecureKey) -> Result<String> {
    sign_hex(&canonical_bytes(body, path, headers), key)
}

/// Checks the `X-Signature` header of a received response.
pub fn verify(body: &[u8], path: &str, headers: &HeaderMap, key: &SecureKey) -> IntegrityStatus {
    let Some(received) = headers.get(SIGNATURE_HEADER) else {
        return IntegrityStatus::Missing;
    };

    match sign(body, path, headers, key) {
        Ok(expected) if signatures_match(received.as_bytes(), expected.as_bytes()) => {
            IntegrityStatus::Valid
        }
        _ => IntegrityStatus::Invalid,
    }
}
