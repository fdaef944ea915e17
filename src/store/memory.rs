//! In-process stores for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    account::AccountRecord, application::ApplicationRecord, license::LicenseRecord,
    owner::OwnerRecord, session::SessionKeys,
};
use crate::store::{Binding, NewLicense, RecordStore, SessionStore};

/// Sessions held in a map, each with its own deadline.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, (SessionKeys, Instant)>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put_new(&self, id: &str, keys: &SessionKeys, ttl: Duration) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, (_, deadline)| *deadline > now);

        if sessions.contains_key(id) {
            return Err(AppError::Internal("Session id collision".to_string()));
        }
        sessions.insert(id.to_string(), (keys.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionKeys>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(keys, _)| keys.clone()))
    }
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, AccountRecord>,
    owners: HashMap<Uuid, OwnerRecord>,
    applications: HashMap<Uuid, ApplicationRecord>,
    licenses: Vec<LicenseRecord>,
}

/// Owners, applications, licenses and accounts behind a single lock.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a license up by id.
    pub async fn license(&self, id: Uuid) -> Option<LicenseRecord> {
        self.tables.read().await.licenses.iter().find(|l| l.id == id).cloned()
    }

    /// Overwrites a stored license, for setting up bound or expired fixtures.
    pub async fn replace_license(&self, license: LicenseRecord) {
        let mut tables = self.tables.write().await;
        if let Some(slot) = tables.licenses.iter_mut().find(|l| l.id == license.id) {
            *slot = license;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_owner(&self, id: Uuid) -> Result<Option<OwnerRecord>> {
        Ok(self.tables.read().await.owners.get(&id).cloned())
    }

    async fn find_application(&self, id: Uuid) -> Result<Option<ApplicationRecord>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn find_license_by_key(&self, key: &str) -> Result<Option<LicenseRecord>> {
        Ok(self.tables.read().await.licenses.iter().find(|l| l.key == key).cloned())
    }

    async fn bind_license_expiry(&self, id: Uuid, expiry: i64) -> Result<Binding<i64>> {
        let mut tables = self.tables.write().await;
        let license = tables
            .licenses
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(AppError::Kind(ErrorKind::InvalidLicense))?;

        Ok(match license.bound_expiry_timestamp {
            Some(existing) => Binding::Existing(existing),
            None => {
                license.bound_expiry_timestamp = Some(expiry);
                Binding::Claimed(expiry)
            }
        })
    }

    async fn bind_license_fingerprint(&self, id: Uuid, fingerprint: &str) -> Result<Binding<String>> {
        let mut tables = self.tables.write().await;
        let license = tables
            .licenses
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(AppError::Kind(ErrorKind::InvalidLicense))?;

        Ok(match &license.bound_fingerprint {
            Some(existing) => Binding::Existing(existing.clone()),
            None => {
                license.bound_fingerprint = Some(fingerprint.to_string());
                Binding::Claimed(fingerprint.to_string())
            }
        })
    }

    async fn bind_application_signature(&self, id: Uuid, signature: &str) -> Result<Binding<String>> {
        let mut tables = self.tables.write().await;
        let app = tables
            .applications
            .get_mut(&id)
            .ok_or(AppError::Kind(ErrorKind::InvalidApp))?;

        Ok(match &app.integrity_signature {
            Some(existing) => Binding::Existing(existing.clone()),
            None => {
                app.integrity_signature = Some(signature.to_string());
                Binding::Claimed(signature.to_string())
            }
        })
    }

    async fn create_account(&self, username: &str, password_hash: &str, admin: bool) -> Result<AccountRecord> {
        let mut tables = self.tables.write().await;
        if tables.accounts.values().any(|a| a.username == username) {
            return Err(ErrorKind::AccountExists.into());
        }

        let account = AccountRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            admin,
            refresh_token: None,
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<AccountRecord>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or(AppError::Kind(ErrorKind::UserNotFound))?;
        account.refresh_token = Some(token.to_string());
        Ok(())
    }

    async fn clear_refresh_token(&self, token: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let holder = tables
            .accounts
            .values_mut()
            .find(|a| a.refresh_token.as_deref() == Some(token));

        Ok(match holder {
            Some(account) => {
                account.refresh_token = None;
                true
            }
            None => false,
        })
    }

    async fn create_owner(&self, account_id: Uuid) -> Result<OwnerRecord> {
        let owner = OwnerRecord {
            id: Uuid::new_v4(),
            application_ids: Vec::new(),
            account_id,
        };
        self.tables.write().await.owners.insert(owner.id, owner.clone());
        Ok(owner)
    }

    async fn create_application(&self, owner_id: Uuid, name: &str) -> Result<ApplicationRecord> {
        let mut tables = self.tables.write().await;
        if tables
            .applications
            .values()
            .any(|a| a.owner_id == owner_id && a.name == name)
        {
            return Err(ErrorKind::ApplicationExists.into());
        }

        let app = ApplicationRecord {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            integrity_signature: None,
            license_ids: Vec::new(),
        };

        let owner = tables
            .owners
            .get_mut(&owner_id)
            .ok_or(AppError::Kind(ErrorKind::InvalidOwner))?;
        owner.application_ids.push(app.id);
        tables.applications.insert(app.id, app.clone());
        Ok(app)
    }

    async fn create_license(&self, license: NewLicense) -> Result<LicenseRecord> {
        let mut tables = self.tables.write().await;
        let record = LicenseRecord {
            id: Uuid::new_v4(),
            application_id: license.application_id,
            owner_id: license.owner_id,
            key: license.key,
            expected_validity_seconds: license.expected_validity_seconds,
            bound_fingerprint: None,
            bound_expiry_timestamp: None,
        };

        let app = tables
            .applications
            .get_mut(&record.application_id)
            .ok_or(AppError::Kind(ErrorKind::InvalidApp))?;
        app.license_ids.push(record.id);
        tables.licenses.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes::SecureKey;

    fn keys() -> SessionKeys {
        SessionKeys {
            encryption_key: SecureKey::new([1u8; 32]),
            nonce: [2u8; 12],
            signing_key: SecureKey::new([3u8; 32]),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_expire_after_ttl() {
        let store = MemorySessionStore::new();
        store.put_new("abc", &keys(), Duration::from_secs(10)).await.unwrap();
        assert!(store.exists("abc").await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_ids_cannot_be_reused() {
        let store = MemorySessionStore::new();
        store.put_new("abc", &keys(), Duration::from_secs(10)).await.unwrap();
        assert!(store.put_new("abc", &keys(), Duration::from_secs(10)).await.is_err());
    }

    #[tokio::test]
    async fn second_binding_keeps_the_first_value() {
        let store = MemoryRecordStore::new();
        let account = store.create_account("owner", "hash", false).await.unwrap();
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

        let first = store.bind_license_fingerprint(license.id, "f1").await.unwrap();
        let second = store.bind_license_fingerprint(license.id, "f2").await.unwrap();
        assert_eq!(first, Binding::Claimed("f1".to_string()));
        assert_eq!(second, Binding::Existing("f1".to_string()));
    }

    #[tokio::test]
    async fn creation_links_children_to_parents() {
        let store = MemoryRecordStore::new();
        let account = store.create_account("owner", "hash", false).await.unwrap();
        let owner = store.create_owner(account.id).await.unwrap();
        let app = store.create_application(owner.id, "app").await.unwrap();

        let owner = store.find_owner(owner.id).await.unwrap().unwrap();
        assert_eq!(owner.application_ids, vec![app.id]);

        let dup = store.create_application(owner.id, "app").await.unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::ApplicationExists);
    }
}
