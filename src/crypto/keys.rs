use base64::{Engine as _, engine::general_purpose};
use rand::{rngs::OsRng, Rng, RngCore};

/// The mask used when a license is created without one.
pub const DEFAULT_LICENSE_MASK: &str = "****-****-****-****";

const DIGITS: &str = "0123456789";
const CAPITALS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";

/// Character classes used to fill a license mask.
#[derive(Debug, Clone, Default)]
pub struct LicenseShape {
    pub mask: Option<String>,
    pub include_capitals: bool,
    pub include_lowercase: bool,
}

/// Generates a license key by replacing every `*` in the mask.
///
/// Digits are always used; letters follow the flags, and both cases are used
/// when neither flag is set.
pub fn generate_license_key(shape: &LicenseShape) -> String {
    let mask = shape
        .mask
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_LICENSE_MASK);

    let mut charset = String::from(DIGITS);
    if shape.include_capitals {
        charset.push_str(CAPITALS);
    }
    if shape.include_lowercase {
        charset.push_str(LOWERCASE);
    }
    if !(shape.include_capitals || shape.include_lowercase) {
        charset.push_str(CAPITALS);
        charset.push_str(LOWERCASE);
    }
    let charset = charset.as_bytes();

    let mut rng = OsRng;
    mask.chars()
        .map(|c| {
            if c == '*' {
                charset[rng.gen_range(0..charset.len())] as char
            } else {
                c
            }
        })
        .collect()
}

/// Fresh session identifier: 32 random bytes, hex encoded.
pub fn generate_session_id() -> String {
    let mut id = [0u8; 32];
    OsRng.fill_bytes(&mut id);
    hex::encode(id)
}

/// An API key of exactly `size` URL-safe characters.
pub fn generate_api_key(size: usize) -> String {
    let mut bytes = vec![0u8; (size * 6).div_ceil(8)];
    OsRng.fill_bytes(&mut bytes);
    let mut key = general_purpose::URL_SAFE.encode(&bytes);
    key.truncate(size);
    key
}

/// A token signing secret of `size` random bytes, standard base64.
pub fn generate_jwt_secret(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::STANDARD.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mask_keeps_separators() {
        let key = generate_license_key(&LicenseShape::default());
        assert_eq!(key.len(), DEFAULT_LICENSE_MASK.len());
        for (k, m) in key.chars().zip(DEFAULT_LICENSE_MASK.chars()) {
            if m == '-' {
                assert_eq!(k, '-');
            } else {
                assert!(k.is_ascii_alphanumeric());
            }
        }
    }

    #[test]
    fn capitals_only_excludes_lowercase() {
        let shape = LicenseShape {
            mask: Some("********************".to_string()),
            include_capitals: true,
            include_lowercase: false,
        };
        for _ in 0..20 {
            let key = generate_license_key(&shape);
            assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn api_key_has_requested_length() {
        for size in [1, 16, 32, 33] {
            assert_eq!(generate_api_key(size).len(), size);
        }
    }

    #[test]
    fn session_ids_are_unique_hex() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
