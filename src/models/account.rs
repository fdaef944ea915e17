use tokio_postgres::Row;
use uuid::Uuid;

/// A registered account.
#[derive(Clone, Debug)]
pub struct AccountRecord {
    /// The unique identifier for the account.
    pub id: Uuid,
    /// The account's username.
    pub username: String,
    /// The Argon2id hash of the password.
    pub password_hash: String,
    /// Whether the account may create owners.
    pub admin: bool,
    /// The refresh token issued on the latest login, if any.
    pub refresh_token: Option<String>,
}

impl From<&Row> for AccountRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password"),
            admin: row.get("admin"),
            refresh_token: row.get("refresh_token"),
        }
    }
}
