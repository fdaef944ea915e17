use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{
    error::{AppError, ErrorKind, Result},
    models::license::LicenseRecord,
    store::{Binding, NewLicense},
};

const LICENSE_COLUMNS: &str =
    "id, application_id, owner_id, key, expected_validity_seconds, fingerprint, expiry";

/// Creates a license and appends it to its application, in one transaction.
pub async fn create_license(pool: &Pool, license: &NewLicense) -> Result<LicenseRecord> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_one(
            format!(
                r#"
                INSERT INTO licenses (id, application_id, owner_id, key, expected_validity_seconds)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {LICENSE_COLUMNS}
                "#
            ).as_str(),
            &[
                &Uuid::new_v4(),
                &license.application_id,
                &license.owner_id,
                &license.key,
                &license.expected_validity_seconds,
            ],
        )
        .await?;
    let record = LicenseRecord::from(&row);

    let updated = tx
        .execute(
            "UPDATE applications SET license_ids = array_append(license_ids, $1) WHERE id = $2",
            &[&record.id, &license.application_id],
        )
        .await?;
    if updated == 0 {
        return Err(ErrorKind::InvalidApp.into());
    }

    tx.commit().await?;
    Ok(record)
}

/// Finds a license by its exact key.
pub async fn find_by_key(pool: &Pool, key: &str) -> Result<Option<LicenseRecord>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = $1 LIMIT 1").as_str(),
            &[&key],
        )
        .await?;
    Ok(row.as_ref().map(LicenseRecord::from))
}

/// Stores the expiry unless one is already set.
pub async fn bind_expiry(pool: &Pool, license_id: &Uuid, expiry: i64) -> Result<Binding<i64>> {
    let client = pool.get().await?;
    let claimed = client
        .query_opt(
            "UPDATE licenses SET expiry = $1 WHERE id = $2 AND expiry IS NULL RETURNING expiry",
            &[&expiry, license_id],
        )
        .await?;
    if let Some(row) = claimed {
        return Ok(Binding::Claimed(row.get(0)));
    }

    let existing = client
        .query_opt("SELECT expiry FROM licenses WHERE id = $1", &[license_id])
        .await?
        .and_then(|row| row.get::<_, Option<i64>>(0))
        .ok_or(AppError::Kind(ErrorKind::InvalidLicense))?;
    Ok(Binding::Existing(existing))
}

/// Stores the device fingerprint unless one is already set.
pub async fn bind_fingerprint(pool: &Pool, license_id: &Uuid, fingerprint: &str) -> Result<Binding<String>> {
    let client = pool.get().await?;
    let claimed = client
        .query_opt(
            r#"
            UPDATE licenses
            SET fingerprint = $1
            WHERE id = $2 AND fingerprint IS NULL
            RETURNING fingerprint
            "#,
            &[&fingerprint, license_id],
        )
        .await?;
    if let Some(row) = claimed {
        return Ok(Binding::Claimed(row.get(0)));
    }

    let existing = client
        .query_opt("SELECT fingerprint FROM licenses WHERE id = $1", &[license_id])
        .await?
        .and_then(|row| row.get::<_, Option<String>>(0))
        .ok_or(AppError::Kind(ErrorKind::InvalidLicense))?;
    Ok(Binding::Existing(existing))
}
