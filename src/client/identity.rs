//! Values a protected program reports about itself when validating.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of the binary at `path`.
pub fn integrity_signature_of(path: &Path) -> Result<String> {
    let binary = std::fs::read(path)?;
    Ok(sha256_hex(&binary))
}

/// Hex SHA-256 of the running executable.
pub fn integrity_signature() -> Result<String> {
    integrity_signature_of(&std::env::current_exe()?)
}

/// Hex SHA-256 over the user name, host name and machine id.
///
/// Fails when any of the three cannot be determined; callers should treat
/// that as fatal rather than validating with a partial fingerprint.
pub fn device_fingerprint() -> Result<String> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map_err(|_| AppError::Internal("Cannot determine the current user".to_string()))?;

    let host = hostname::get()?
        .into_string()
        .map_err(|_| AppError::Internal("Host name is not valid UTF-8".to_string()))?;

    let machine_id = machine_id()?;
    Ok(fingerprint_from(&user, &host, &machine_id))
}

fn fingerprint_from(user: &str, host: &str, machine_id: &str) -> String {
    let encoded_id = general_purpose::STANDARD.encode(machine_id);
    sha256_hex(format!("{}{}{}", user, host, encoded_id).as_bytes())
}

fn machine_id() -> Result<String> {
    MACHINE_ID_PATHS
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Internal("No machine id available".to_string()))
}
