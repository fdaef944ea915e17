use uuid::Uuid;

use crate::crypto::keys::{LicenseShape, generate_license_key};
use crate::error::{ErrorKind, Result};
use crate::models::{application::ApplicationRecord, license::LicenseRecord, owner::OwnerRecord};
use crate::services::auth::Claims;
use crate::store::{NewLicense, RecordStore};
use crate::validation::messages::{CreateApplication, CreateLicense, CreateOwner};

/// Creates an owner linked to an existing account. Admins only.
pub async fn create_owner(
    records: &dyn RecordStore,
    claims: &Claims,
    msg: &CreateOwner,
) -> Result<OwnerRecord> {
    if !claims.is_admin() {
        return Err(ErrorKind::Unauthorized.into());
    }

    let account_id = Uuid::parse_str(&msg.user_id).map_err(|_| ErrorKind::InvalidUserId)?;
    records
        .find_account(account_id)
        .await?
        .ok_or(ErrorKind::InvalidUserId)?;

    let owner = records.create_owner(account_id).await?;
    tracing::info!("✅ Owner {} created for account {}", owner.id, account_id);
    Ok(owner)
}

/// Creates an application under an owner the caller controls.
pub async fn create_application(
    records: &dyn RecordStore,
    claims: &Claims,
    msg: &CreateApplication,
) -> Result<ApplicationRecord> {
    let owner = find_owner(records, &msg.owner_id).await?;
    authorize(records, claims, &owner).await?;

    let app = records.create_application(owner.id, &msg.name).await?;
    tracing::info!("✅ Application {} created under owner {}", app.id, owner.id);
    Ok(app)
}

/// Mints a license key for an application the caller controls.
pub async fn create_license(
    records: &dyn RecordStore,
    claims: &Claims,
    msg: &CreateLicense,
) -> Result<LicenseRecord> {
    let owner = find_owner(records, &msg.owner_id).await?;

    let app_id = Uuid::parse_str(&msg.app_id).map_err(|_| ErrorKind::InvalidApp)?;
    let app = records
        .find_application(app_id)
        .await?
        .filter(|app| app.owner_id == owner.id && app.name == msg.name)
        .ok_or(ErrorKind::InvalidApp)?;

    authorize(records, claims, &owner).await?;

    let key = generate_license_key(&LicenseShape {
        mask: msg.mask.clone(),
        include_capitals: msg.include_capitals,
        include_lowercase: msg.include_lowercase,
    });

    let license = records
        .create_license(NewLicense {
            application_id: app.id,
            owner_id: owner.id,
            key,
            expected_validity_seconds: msg.expiry,
        })
        .await?;

    tracing::info!("✅ License {} issued for application {}", license.id, app.id);
    Ok(license)
}

async fn find_owner(records: &dyn RecordStore, owner_id: &str) -> Result<OwnerRecord> {
    let owner_id = Uuid::parse_str(owner_id).map_err(|_| ErrorKind::InvalidOwner)?;
    Ok(records
        .find_owner(owner_id)
        .await?
        .ok_or(ErrorKind::InvalidOwner)?)
}

/// The caller's account must be the one linked to the owner.
async fn authorize(records: &dyn RecordStore, claims: &Claims, owner: &OwnerRecord) -> Result<()> {
    let account = records
        .find_account_by_username(&claims.username)
        .await?
        .ok_or(ErrorKind::UserNotFound)?;

    if account.id != owner.account_id {
        tracing::warn!("⚠️  {} tried to act on owner {}", account.id, owner.id);
        return Err(ErrorKind::Unauthorized.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRecordStore;

    fn claims(username: &str, admin: i8) -> Claims {
        Claims {
            username: username.to_string(),
            admin,
            exp: i64::MAX,
        }
    }

    #[tokio::test]
    async fn only_admins_create_owners() {
        let store = MemoryRecordStore::new();
        let vendor = store.create_account("vendor", "hash", false).await.unwrap();
        let msg = CreateOwner {
            user_id: vendor.id.to_string(),
        };

        let denied = create_owner(&store, &claims("vendor", 0), &msg).await.unwrap_err();
        assert_eq!(denied.kind(), ErrorKind::Unauthorized);

        let owner = create_owner(&store, &claims("root", 1), &msg).await.unwrap();
        assert_eq!(owner.account_id, vendor.id);

        let unknown = CreateOwner {
            user_id: uuid::Uuid::new_v4().to_string(),
        };
        let err = create_owner(&store, &claims("root", 1), &unknown).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUserId);
    }

    #[tokio::test]
    async fn strangers_cannot_use_someone_elses_owner() {
        let store = MemoryRecordStore::new();
        let vendor = store.create_account("vendor", "hash", false).await.unwrap();
        store.create_account("mallory", "hash", false).await.unwrap();
        let owner = store.create_owner(vendor.id).await.unwrap();

        let msg = CreateApplication {
            owner_id: owner.id.to_string(),
            name: "app".to_string(),
        };
        let err = create_application(&store, &claims("mallory", 0), &msg).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let app = create_application(&store, &claims("vendor", 0), &msg).await.unwrap();
        assert_eq!(app.owner_id, owner.id);
    }

    #[tokio::test]
    async fn license_follows_mask_and_links_to_app() {
        let store = MemoryRecordStore::new();
        let vendor = store.create_account("vendor", "hash", false).await.unwrap();
        let owner = store.create_owner(vendor.id).await.unwrap();
        let app = store.create_application(owner.id, "app").await.unwrap();

        let msg = CreateLicense {
            owner_id: owner.id.to_string(),
            app_id: app.id.to_string(),
            name: "app".to_string(),
            expiry: 3600,
            mask: Some("**-**".to_string()),
            include_capitals: true,
            include_lowercase: false,
        };
        let license = create_license(&store, &claims("vendor", 0), &msg).await.unwrap();
        assert_eq!(license.key.len(), 5);
        assert_eq!(license.expected_validity_seconds, 3600);

        let app = store.find_application(app.id).await.unwrap().unwrap();
        assert_eq!(app.license_ids, vec![license.id]);

        let wrong_name = CreateLicense {
            name: "other".to_string(),
            ..msg
        };
        let err = create_license(&store, &claims("vendor", 0), &wrong_name).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidApp);
    }
}
