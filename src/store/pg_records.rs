use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    account::AccountRecord, application::ApplicationRecord, license::LicenseRecord,
    owner::OwnerRecord,
};
use crate::repositories::{account, application, license, owner};
use crate::store::{Binding, NewLicense, RecordStore};

/// Record store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Pool,
}

impl PgRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_owner(&self, id: Uuid) -> Result<Option<OwnerRecord>> {
        owner::find_by_id(&self.pool, &id).await
    }

    async fn find_application(&self, id: Uuid) -> Result<Option<ApplicationRecord>> {
        application::find_by_id(&self.pool, &id).await
    }

    async fn find_license_by_key(&self, key: &str) -> Result<Option<LicenseRecord>> {
        license::find_by_key(&self.pool, key).await
    }

    async fn bind_license_expiry(&self, id: Uuid, expiry: i64) -> Result<Binding<i64>> {
        license::bind_expiry(&self.pool, &id, expiry).await
    }

    async fn bind_license_fingerprint(&self, id: Uuid, fingerprint: &str) -> Result<Binding<String>> {
        license::bind_fingerprint(&self.pool, &id, fingerprint).await
    }

    async fn bind_application_signature(&self, id: Uuid, signature: &str) -> Result<Binding<String>> {
        application::bind_signature(&self.pool, &id, signature).await
    }

    async fn create_account(&self, username: &str, password_hash: &str, admin: bool) -> Result<AccountRecord> {
        account::create_account(&self.pool, username, password_hash, admin).await
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<AccountRecord>> {
        account::find_by_id(&self.pool, &id).await
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>> {
        account::find_by_username(&self.pool, username).await
    }

    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<()> {
        account::set_refresh_token(&self.pool, &account_id, token).await
    }

    async fn clear_refresh_token(&self, token: &str) -> Result<bool> {
        account::clear_refresh_token(&self.pool, token).await
    }

    async fn create_owner(&self, account_id: Uuid) -> Result<OwnerRecord> {
        owner::create_owner(&self.pool, &account_id).await
    }

    async fn create_application(&self, owner_id: Uuid, name: &str) -> Result<ApplicationRecord> {
        application::create_application(&self.pool, &owner_id, name).await
    }

    async fn create_license(&self, new: NewLicense) -> Result<LicenseRecord> {
        license::create_license(&self.pool, &new).await
    }

    async fn close(&self) {
        self.pool.close();
    }
}
