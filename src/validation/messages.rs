//! Request bodies carried inside sealed envelopes.
//!
//! Field rules only check presence; semantic checks live in the services.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// A license validation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LicenseValidate {
    /// Hash of the protected client binary.
    #[garde(length(min = 1))]
    pub integrity_signature: String,
    #[garde(length(min = 1))]
    pub fingerprint: String,
    #[garde(length(min = 1))]
    pub app_id: String,
    #[garde(length(min = 1))]
    pub owner_id: String,
    #[garde(length(min = 1))]
    pub license_key: String,
}

/// Register and login bodies.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[garde(length(min = 1))]
    pub username: String,
    #[garde(length(min = 1))]
    pub password: String,
    /// Registering with the server's API key creates an admin account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOwner {
    #[garde(length(min = 1))]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApplication {
    #[garde(length(min = 1))]
    pub owner_id: String,
    #[garde(length(min = 1))]
    pub name: String,
}

/// Upper bound on a license's validity: one hundred years.
pub const MAX_LICENSE_VALIDITY: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateLicense {
    #[garde(length(min = 1))]
    pub owner_id: String,
    #[garde(length(min = 1))]
    pub app_id: String,
    /// Name of the application `app_id` refers to.
    #[garde(length(min = 1))]
    pub name: String,
    /// Validity in seconds, counted from the first validation.
    #[garde(range(min = 1, max = MAX_LICENSE_VALIDITY))]
    pub expiry: i64,
    #[serde(default)]
    #[garde(skip)]
    pub mask: Option<String>,
    #[serde(default)]
    #[garde(skip)]
    pub include_capitals: bool,
    #[serde(default)]
    #[garde(skip)]
    pub include_lowercase: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::parse_body;
    use crate::error::ErrorKind;

    #[test]
    fn license_request_requires_every_field() {
        let body = br#"{"integrity_signature":"s1","fingerprint":"","app_id":"a","owner_id":"o","license_key":"k"}"#;
        let err = parse_body::<LicenseValidate>(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyFields);
    }

    #[test]
    fn api_key_is_optional() {
        let creds: Credentials = parse_body(br#"{"username":"bob","password":"x"}"#).unwrap();
        assert!(creds.api_key.is_none());
    }

    #[test]
    fn license_optionals_default_off() {
        let msg: CreateLicense =
            parse_body(br#"{"owner_id":"o","app_id":"a","name":"n","expiry":3600}"#).unwrap();
        assert!(msg.mask.is_none());
        assert!(!msg.include_capitals && !msg.include_lowercase);

        let zero = parse_body::<CreateLicense>(br#"{"owner_id":"o","app_id":"a","name":"n","expiry":0}"#);
        assert_eq!(zero.unwrap_err().kind(), ErrorKind::EmptyFields);
    }

    #[test]
    fn license_validity_is_capped() {
        let body = format!(
            r#"{{"owner_id":"o","app_id":"a","name":"n","expiry":{}}}"#,
            MAX_LICENSE_VALIDITY
        );
        assert!(parse_body::<CreateLicense>(body.as_bytes()).is_ok());

        let too_long = format!(r#"{{"owner_id":"o","app_id":"a","name":"n","expiry":{}}}"#, i64::MAX);
        let err = parse_body::<CreateLicense>(too_long.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyFields);
    }
}
