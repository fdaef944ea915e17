use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// A license key and its first-use binding.
///
/// `bound_fingerprint` and `bound_expiry_timestamp` start empty and are set
/// once, by the first validation; after that they never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// The unique identifier for the license.
    pub id: Uuid,
    /// The application the license was issued for.
    pub application_id: Uuid,
    /// The owner that issued the license.
    pub owner_id: Uuid,
    /// The human-facing license string.
    pub key: String,
    /// How long the license stays valid once bound, in seconds.
    pub expected_validity_seconds: i64,
    /// The device fingerprint bound on first use.
    pub bound_fingerprint: Option<String>,
    /// Unix timestamp after which the license is expired.
    pub bound_expiry_timestamp: Option<i64>,
}

impl From<&Row> for LicenseRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            application_id: row.get("application_id"),
            owner_id: row.get("owner_id"),
            key: row.get("key"),
            expected_validity_seconds: row.get("expected_validity_seconds"),
            bound_fingerprint: row.get("fingerprint"),
            bound_expiry_timestamp: row.get("expiry"),
        }
    }
}
