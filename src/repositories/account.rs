use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    error::{AppError, ErrorKind, Result},
    models::account::AccountRecord,
};

const ACCOUNT_COLUMNS: &str = "id, username, password, admin, refresh_token";

/// Creates a new account. A taken username maps to `AccountExists`.
pub async fn create_account(
    pool: &Pool,
    username: &str,
    password_hash: &str,
    admin: bool,
) -> Result<AccountRecord> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            format!(
                r#"
                INSERT INTO accounts (id, username, password, admin)
                VALUES ($1, $2, $3, $4)
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ).as_str(),
            &[&Uuid::new_v4(), &username, &password_hash, &admin],
        )
        .await
        .map_err(|e| match e.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => ErrorKind::AccountExists.into(),
            _ => AppError::from(e),
        })?;
    Ok(AccountRecord::from(&row))
}

/// Finds an account by its ID.
pub async fn find_by_id(pool: &Pool, account_id: &Uuid) -> Result<Option<AccountRecord>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1").as_str(),
            &[account_id],
        )
        .await?;
    Ok(row.as_ref().map(AccountRecord::from))
}

/// Finds an account by its username.
pub async fn find_by_username(pool: &Pool, username: &str) -> Result<Option<AccountRecord>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1").as_str(),
            &[&username],
        )
        .await?;
    Ok(row.as_ref().map(AccountRecord::from))
}

/// Replaces the account's refresh token.
pub async fn set_refresh_token(pool: &Pool, account_id: &Uuid, token: &str) -> Result<()> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE accounts SET refresh_token = $1 WHERE id = $2",
            &[&token, account_id],
        )
        .await?;
    if updated == 0 {
        return Err(ErrorKind::UserNotFound.into());
    }
    Ok(())
}

/// Clears the refresh token from whichever account holds it.
pub async fn clear_refresh_token(pool: &Pool, token: &str) -> Result<bool> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE accounts SET refresh_token = NULL WHERE refresh_token = $1",
            &[&token],
        )
        .await?;
    Ok(updated > 0)
}
