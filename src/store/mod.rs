//! Narrow record-oriented contracts for the two backing stores.
//!
//! The session store is a key-value store with TTL expiry; the record store
//! holds owners, applications, licenses and accounts. Both are external
//! collaborators: the protocol only talks to them through these traits.

pub mod memory;
pub mod pg_records;
pub mod redis_sessions;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    account::AccountRecord, application::ApplicationRecord, license::LicenseRecord,
    owner::OwnerRecord, session::SessionKeys,
};

/// Outcome of a set-if-unset write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<T> {
    /// This call stored the value.
    Claimed(T),
    /// A value was already stored; it is returned unchanged.
    Existing(T),
}

impl<T> Binding<T> {
    /// The value now held by the store.
    pub fn into_value(self) -> T {
        match self {
            Binding::Claimed(v) | Binding::Existing(v) => v,
        }
    }

    pub fn was_claimed(&self) -> bool {
        matches!(self, Binding::Claimed(_))
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session. Fails if the id is already taken.
    async fn put_new(&self, id: &str, keys: &SessionKeys, ttl: Duration) -> Result<()>;

    /// Loads a live session.
    async fn get(&self, id: &str) -> Result<Option<SessionKeys>>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    async fn close(&self) {}
}

/// Fields for a new license row.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub application_id: Uuid,
    pub owner_id: Uuid,
    pub key: String,
    pub expected_validity_seconds: i64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_owner(&self, id: Uuid) -> Result<Option<OwnerRecord>>;

    async fn find_application(&self, id: Uuid) -> Result<Option<ApplicationRecord>>;

    /// Exact key match. Duplicate keys are not detected; the first match wins.
    async fn find_license_by_key(&self, key: &str) -> Result<Option<LicenseRecord>>;

    /// Sets the license expiry only if it is still unset.
    async fn bind_license_expiry(&self, id: Uuid, expiry: i64) -> Result<Binding<i64>>;

    /// Sets the license fingerprint only if it is still unset.
    async fn bind_license_fingerprint(&self, id: Uuid, fingerprint: &str) -> Result<Binding<String>>;

    /// Sets the application integrity signature only if it is still unset.
    async fn bind_application_signature(&self, id: Uuid, signature: &str) -> Result<Binding<String>>;

    /// Creates an account. An existing username yields `AccountExists`.
    async fn create_account(&self, username: &str, password_hash: &str, admin: bool) -> Result<AccountRecord>;

    async fn find_account(&self, id: Uuid) -> Result<Option<AccountRecord>>;

    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>>;

    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<()>;

    /// Clears whichever account holds this refresh token.
    async fn clear_refresh_token(&self, token: &str) -> Result<bool>;

    async fn create_owner(&self, account_id: Uuid) -> Result<OwnerRecord>;

    /// Creates an application and appends it to the owner's list.
    /// A duplicate name under the same owner yields `ApplicationExists`.
    async fn create_application(&self, owner_id: Uuid, name: &str) -> Result<ApplicationRecord>;

    /// Creates a license and appends it to the application's list.
    async fn create_license(&self, license: NewLicense) -> Result<LicenseRecord>;

    async fn close(&self) {}
}
