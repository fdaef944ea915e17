use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::config::Tunables;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::account::AccountRecord;
use crate::store::RecordStore;
use crate::validation::auth::{validate_password, validate_username};
use crate::validation::messages::Credentials;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 4;

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    /// `1` for admin accounts.
    #[serde(default)]
    pub admin: i8,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.admin == 1
    }
}

/// Tokens handed out on login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    Ok(password_hash)
}

/// Verifies a password against a PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Encryption(format!("Hash parse error: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Signs an HS512 token valid for `minutes`.
pub fn issue_token(secret: &str, username: &str, admin: i8, minutes: i64) -> Result<String> {
    let exp = minutes
        .checked_mul(60)
        .and_then(|seconds| Utc::now().timestamp().checked_add(seconds))
        .ok_or_else(|| AppError::Internal(format!("token lifetime of {} minutes overflows", minutes)))?;
    let claims = Claims {
        username: username.to_string(),
        admin,
        exp,
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS512),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verifies signature, algorithm and expiry.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS512);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Creates an account.
///
/// Checks run in order: password strength, username length, then uniqueness
/// in the store. The account is an admin iff `api_key` equals the configured
/// key.
pub async fn register(
    records: &dyn RecordStore,
    msg: &Credentials,
    configured_api_key: Option<&str>,
) -> Result<AccountRecord> {
    validate_password(&msg.password)?;
    validate_username(&msg.username)?;

    let admin = match (msg.api_key.as_deref(), configured_api_key) {
        (Some(given), Some(expected)) => bool::from(given.as_bytes().ct_eq(expected.as_bytes())),
        _ => false,
    };

    let password_hash = hash_password(&msg.password)?;
    let account = records
        .create_account(&msg.username, &password_hash, admin)
        .await?;

    tracing::info!("✅ Account registered: {} (admin: {})", account.id, admin);
    Ok(account)
}

/// Authenticates and issues a token pair, storing the refresh token.
pub async fn login(
    records: &dyn RecordStore,
    secret: &str,
    tunables: &Tunables,
    msg: &Credentials,
) -> Result<TokenPair> {
    let account = records
        .find_account_by_username(&msg.username)
        .await?
        .ok_or(ErrorKind::UserNotFound)?;

    if !verify_password(&msg.password, &account.password_hash)? {
        tracing::warn!("⚠️  Wrong password for {}", account.id);
        return Err(ErrorKind::IncorrectPassword.into());
    }

    let admin = i8::from(account.admin);
    let pair = TokenPair {
        token: issue_token(secret, &account.username, admin, tunables.access_token_minutes)?,
        refresh_token: issue_token(secret, &account.username, admin, tunables.refresh_token_minutes)?,
    };
    records.set_refresh_token(account.id, &pair.refresh_token).await?;

    tracing::info!("🔐 Login successful: {}", account.id);
    Ok(pair)
}

/// Issues a new access token for a refresh token that is still current.
pub async fn refresh(
    records: &dyn RecordStore,
    secret: &str,
    tunables: &Tunables,
    refresh_token: &str,
) -> Result<String> {
    let claims = decode_token(secret, refresh_token)?;

    let account = records
        .find_account_by_username(&claims.username)
        .await?
        .ok_or(ErrorKind::Unauthorized)?;

    let current = account.refresh_token.as_deref().unwrap_or_default();
    if !bool::from(current.as_bytes().ct_eq(refresh_token.as_bytes())) {
        tracing::warn!("⚠️  Stale refresh token for {}", account.id);
        return Err(ErrorKind::Unauthorized.into());
    }

    issue_token(
        secret,
        &account.username,
        i8::from(account.admin),
        tunables.access_token_minutes,
    )
}

/// Forgets the refresh token.
pub async fn logout(records: &dyn RecordStore, refresh_token: &str) -> Result<()> {
    if records.clear_refresh_token(refresh_token).await? {
        tracing::info!("👋 Refresh token revoked");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRecordStore;

    const SECRET: &str = "test-secret";

    fn creds(username: &str, password: &str, api_key: Option<&str>) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn tokens_round_trip_their_claims() {
        let token = issue_token(SECRET, "alice", 1, 15).unwrap();
        let claims = decode_token(SECRET, &token).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin());

        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = issue_token(SECRET, "alice", 0, -5).unwrap();
        let err = decode_token(SECRET, &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn overflowing_lifetime_is_an_internal_error() {
        let err = issue_token(SECRET, "alice", 0, i64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn api_key_grants_admin() {
        let store = MemoryRecordStore::new();
        let admin = register(&store, &creds("root", "Passw0rd!", Some("k3y")), Some("k3y"))
            .await
            .unwrap();
        let user = register(&store, &creds("user", "Passw0rd!", Some("nope")), Some("k3y"))
            .await
            .unwrap();
        assert!(admin.admin);
        assert!(!user.admin);

        let dup = register(&store, &creds("user", "Passw0rd!", None), None).await.unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::AccountExists);
    }

    #[tokio::test]
    async fn login_refresh_logout_cycle() {
        let store = MemoryRecordStore::new();
        let tunables = Tunables::default();
        register(&store, &creds("alice", "Passw0rd!", None), None).await.unwrap();

        let wrong = login(&store, SECRET, &tunables, &creds("alice", "Wrong0ne!", None)).await;
        assert_eq!(wrong.unwrap_err().kind(), ErrorKind::IncorrectPassword);

        let pair = login(&store, SECRET, &tunables, &creds("alice", "Passw0rd!", None)).await.unwrap();
        let access = refresh(&store, SECRET, &tunables, &pair.refresh_token).await.unwrap();
        assert_eq!(decode_token(SECRET, &access).unwrap().username, "alice");

        logout(&store, &pair.refresh_token).await.unwrap();
        let after = refresh(&store, SECRET, &tunables, &pair.refresh_token).await.unwrap_err();
        assert_eq!(after.kind(), ErrorKind::Unauthorized);
    }
}
