use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// A protected client application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Hash of the protected client binary, bound on first validation.
    pub integrity_signature: Option<String>,
    /// Licenses issued for this application, in creation order.
    pub license_ids: Vec<Uuid>,
}

impl From<&Row> for ApplicationRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            name: row.get("name"),
            integrity_signature: row.get("integrity_signature"),
            license_ids: row.get("license_ids"),
        }
    }
}
