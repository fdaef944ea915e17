use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// An owner groups applications under one authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub id: Uuid,
    pub application_ids: Vec<Uuid>,
    pub account_id: Uuid,
}

impl OwnerRecord {
    /// Whether the application is registered under this owner.
    pub fn owns_application(&self, app_id: &Uuid) -> bool {
        self.application_ids.contains(app_id)
    }
}

impl From<&Row> for OwnerRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            application_ids: row.get("app_ids"),
            account_id: row.get("account_id"),
        }
    }
}
