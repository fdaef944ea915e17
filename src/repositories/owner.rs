use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{error::Result, models::owner::OwnerRecord};

/// Creates an owner with no applications.
pub async fn create_owner(pool: &Pool, account_id: &Uuid) -> Result<OwnerRecord> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO owners (id, account_id)
            VALUES ($1, $2)
            RETURNING id, account_id, app_ids
            "#,
            &[&Uuid::new_v4(), account_id],
        )
        .await?;
    Ok(OwnerRecord::from(&row))
}

/// Finds an owner by its ID.
pub async fn find_by_id(pool: &Pool, owner_id: &Uuid) -> Result<Option<OwnerRecord>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT id, account_id, app_ids
            FROM owners
            WHERE id = $1
            "#,
            &[owner_id],
        )
        .await?;
    Ok(row.as_ref().map(OwnerRecord::from))
}
