use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    error::{AppError, ErrorKind, Result},
    models::application::ApplicationRecord,
    store::Binding,
};

/// Creates an application and registers it under its owner, in one transaction.
pub async fn create_application(pool: &Pool, owner_id: &Uuid, name: &str) -> Result<ApplicationRecord> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_one(
            r#"
            INSERT INTO applications (id, owner_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, name, integrity_signature, license_ids
            "#,
            &[&Uuid::new_v4(), owner_id, &name],
        )
        .await
        .map_err(|e| match e.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => ErrorKind::ApplicationExists.into(),
            _ => AppError::from(e),
        })?;
    let app = ApplicationRecord::from(&row);

    let updated = tx
        .execute(
            "UPDATE owners SET app_ids = array_append(app_ids, $1) WHERE id = $2",
            &[&app.id, owner_id],
        )
        .await?;
    if updated == 0 {
        return Err(ErrorKind::InvalidOwner.into());
    }

    tx.commit().await?;
    Ok(app)
}

/// Finds an application by its ID.
pub async fn find_by_id(pool: &Pool, app_id: &Uuid) -> Result<Option<ApplicationRecord>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT id, owner_id, name, integrity_signature, license_ids
            FROM applications
            WHERE id = $1
            "#,
            &[app_id],
        )
        .await?;
    Ok(row.as_ref().map(ApplicationRecord::from))
}

/// Stores the integrity signature unless one is already set.
pub async fn bind_signature(pool: &Pool, app_id: &Uuid, signature: &str) -> Result<Binding<String>> {
    let client = pool.get().await?;
    let claimed = client
        .query_opt(
            r#"
            UPDATE applications
            SET integrity_signature = $1
            WHERE id = $2 AND integrity_signature IS NULL
            RETURNING integrity_signature
            "#,
            &[&signature, app_id],
        )
        .await?;
    if let Some(row) = claimed {
        return Ok(Binding::Claimed(row.get(0)));
    }

    let existing = client
        .query_opt(
            "SELECT integrity_signature FROM applications WHERE id = $1",
            &[app_id],
        )
        .await?
        .and_then(|row| row.get::<_, Option<String>>(0))
        .ok_or(AppError::Kind(ErrorKind::InvalidApp))?;
    Ok(Binding::Existing(existing))
}
