//! License validation: load, bind on first use, then check.

use uuid::Uuid;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{application::ApplicationRecord, license::LicenseRecord, owner::OwnerRecord};
use crate::store::RecordStore;
use crate::validation::messages::LicenseValidate;

/// Records resolved for one validation.
struct Loaded {
    owner: OwnerRecord,
    application: ApplicationRecord,
    license: LicenseRecord,
}

/// Values in force after first-use binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub fingerprint: String,
    pub integrity_signature: String,
    pub expiry: i64,
}

/// Validates a license at time `now` (Unix seconds).
///
/// Unset bindings are claimed with the request's values before any check
/// runs, so the first validation of a fresh license always binds it. The
/// first failing check wins; fingerprint and integrity mismatches share
/// `InvalidFingerprint`.
pub async fn validate_license(
    records: &dyn RecordStore,
    msg: &LicenseValidate,
    now: i64,
) -> Result<Bound> {
    let loaded = load(records, msg).await?;
    tracing::debug!(
        "📄 License {} loaded for owner {} / app {}",
        loaded.license.id,
        loaded.owner.id,
        loaded.application.id
    );

    let bound = bind_first_use(records, &loaded, msg, now).await?;
    check(&bound, msg, now)?;

    tracing::info!("✅ License {} validated", loaded.license.id);
    Ok(bound)
}

async fn load(records: &dyn RecordStore, msg: &LicenseValidate) -> Result<Loaded> {
    let owner_id = Uuid::parse_str(&msg.owner_id).map_err(|_| ErrorKind::InvalidOwner)?;
    let owner = records
        .find_owner(owner_id)
        .await?
        .ok_or(ErrorKind::InvalidOwner)?;

    let app_id = Uuid::parse_str(&msg.app_id).map_err(|_| ErrorKind::InvalidApp)?;
    if !owner.owns_application(&app_id) {
        return Err(ErrorKind::InvalidApp.into());
    }
    let application = records
        .find_application(app_id)
        .await?
        .ok_or(ErrorKind::InvalidApp)?;

    let license = records
        .find_license_by_key(&msg.license_key)
        .await?
        .ok_or(ErrorKind::InvalidLicense)?;

    Ok(Loaded {
        owner,
        application,
        license,
    })
}

async fn bind_first_use(
    records: &dyn RecordStore,
    loaded: &Loaded,
    msg: &LicenseValidate,
    now: i64,
) -> Result<Bound> {
    let license = &loaded.license;
    let application = &loaded.application;

    let expiry = match license.bound_expiry_timestamp {
        Some(expiry) => expiry,
        None => {
            let expiry = now.saturating_add(license.expected_validity_seconds);
            let binding = records
                .bind_license_expiry(license.id, expiry)
                .await
                .map_err(|e| binding_failed("expiry", e))?;
            if binding.was_claimed() {
                tracing::info!("🔗 License {} expiry bound", license.id);
            }
            binding.into_value()
        }
    };

    let fingerprint = match &license.bound_fingerprint {
        Some(fingerprint) => fingerprint.clone(),
        None => {
            let binding = records
                .bind_license_fingerprint(license.id, &msg.fingerprint)
                .await
                .map_err(|e| binding_failed("fingerprint", e))?;
            if binding.was_claimed() {
                tracing::info!("🔗 License {} bound to a device", license.id);
            }
            binding.into_value()
        }
    };

    let integrity_signature = match &application.integrity_signature {
        Some(signature) => signature.clone(),
        None => {
            let binding = records
                .bind_application_signature(application.id, &msg.integrity_signature)
                .await
                .map_err(|e| binding_failed("integrity signature", e))?;
            if binding.was_claimed() {
                tracing::info!("🔗 Application {} integrity signature bound", application.id);
            }
            binding.into_value()
        }
    };

    Ok(Bound {
        fingerprint,
        integrity_signature,
        expiry,
    })
}

fn binding_failed(field: &str, e: AppError) -> AppError {
    tracing::error!("❌ Failed to bind license {}: {}", field, e);
    e
}

fn check(bound: &Bound, msg: &LicenseValidate, now: i64) -> Result<()> {
    if msg.fingerprint != bound.fingerprint {
        return Err(ErrorKind::InvalidFingerprint.into());
    }
    if msg.integrity_signature != bound.integrity_signature {
        return Err(ErrorKind::InvalidFingerprint.into());
    }
    if now > bound.expiry {
        return Err(ErrorKind::ExpiredLicense.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{NewLicense, memory::MemoryRecordStore};

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        store: MemoryRecordStore,
        owner_id: Uuid,
        app_id: Uuid,
        license_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryRecordStore::new();
        let account = store.create_account("vendor", "hash", false).await.unwrap();
        let owner = store.create_owner(account.id).await.unwrap();
        let app = store.create_application(owner.id, "app").await.unwrap();
        let license = store
            .create_license(NewLicense {
                application_id: app.id,
                owner_id: owner.id,
                key: "ABCD-1234".to_string(),
                expected_validity_seconds: 3600,
            })
            .await
            .unwrap();
        Fixture {
            store,
            owner_id: owner.id,
            app_id: app.id,
            license_id: license.id,
        }
    }

    fn request(f: &Fixture, fingerprint: &str, signature: &str) -> LicenseValidate {
        LicenseValidate {
            integrity_signature: signature.to_string(),
            fingerprint: fingerprint.to_string(),
            app_id: f.app_id.to_string(),
            owner_id: f.owner_id.to_string(),
            license_key: "ABCD-1234".to_string(),
        }
    }

    #[tokio::test]
    async fn first_use_binds_and_repeat_use_is_idempotent() {
        let f = fixture().await;
        let msg = request(&f, "f1", "s1");

        let first = validate_license(&f.store, &msg, NOW).await.unwrap();
        assert_eq!(first.expiry, NOW + 3600);

        let second = validate_license(&f.store, &msg, NOW + 10).await.unwrap();
        assert_eq!(first, second);

        let stored = f.store.license(f.license_id).await.unwrap();
        assert_eq!(stored.bound_fingerprint.as_deref(), Some("f1"));
        assert_eq!(stored.bound_expiry_timestamp, Some(NOW + 3600));
    }

    #[tokio::test]
    async fn other_device_is_rejected() {
        let f = fixture().await;
        validate_license(&f.store, &request(&f, "f1", "s1"), NOW).await.unwrap();

        let err = validate_license(&f.store, &request(&f, "f2", "s1"), NOW).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFingerprint);
    }

    #[tokio::test]
    async fn tampered_binary_reuses_fingerprint_error() {
        let f = fixture().await;
        validate_license(&f.store, &request(&f, "f1", "s1"), NOW).await.unwrap();

        let err = validate_license(&f.store, &request(&f, "f1", "s2"), NOW).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFingerprint);
    }

    #[tokio::test]
    async fn expiry_wins_over_correct_bindings() {
        let f = fixture().await;
        let mut license = f.store.license(f.license_id).await.unwrap();
        license.bound_fingerprint = Some("f1".to_string());
        license.bound_expiry_timestamp = Some(NOW - 1);
        f.store.replace_license(license).await;

        let err = validate_license(&f.store, &request(&f, "f1", "s1"), NOW).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpiredLicense);
    }

    #[tokio::test]
    async fn lookups_fail_with_their_own_kinds() {
        let f = fixture().await;

        let mut msg = request(&f, "f1", "s1");
        msg.owner_id = "not-a-uuid".to_string();
        assert_eq!(validate_license(&f.store, &msg, NOW).await.unwrap_err().kind(), ErrorKind::InvalidOwner);

        let mut msg = request(&f, "f1", "s1");
        msg.app_id = Uuid::new_v4().to_string();
        assert_eq!(validate_license(&f.store, &msg, NOW).await.unwrap_err().kind(), ErrorKind::InvalidApp);

        let mut msg = request(&f, "f1", "s1");
        msg.license_key = "ZZZZ-0000".to_string();
        assert_eq!(validate_license(&f.store, &msg, NOW).await.unwrap_err().kind(), ErrorKind::InvalidLicense);
    }

    #[tokio::test]
    async fn huge_validity_saturates_instead_of_wrapping() {
        let f = fixture().await;
        let mut license = f.store.license(f.license_id).await.unwrap();
        license.expected_validity_seconds = i64::MAX;
        f.store.replace_license(license).await;

        let bound = validate_license(&f.store, &request(&f, "f1", "s1"), NOW).await.unwrap();
        assert_eq!(bound.expiry, i64::MAX);

        let again = validate_license(&f.store, &request(&f, "f1", "s1"), NOW + 1).await.unwrap();
        assert_eq!(again.expiry, i64::MAX);
    }

    #[tokio::test]
    async fn racing_first_uses_bind_exactly_one_device() {
        let f = fixture().await;
        let store = Arc::new(f.store.clone());

        let a = {
            let store = store.clone();
            let msg = request(&f, "fa", "s1");
            tokio::spawn(async move { validate_license(&*store, &msg, NOW).await })
        };
        let b = {
            let store = store.clone();
            let msg = request(&f, "fb", "s1");
            tokio::spawn(async move { validate_license(&*store, &msg, NOW).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }
}
