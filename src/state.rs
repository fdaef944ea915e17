use std::sync::Arc;

use crate::config::ConfigHandle;
use crate::error::Result;
use crate::store::{
    RecordStore, SessionStore, pg_records::PgRecordStore, redis_sessions::RedisSessionStore,
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Owners, applications, licenses and accounts.
    pub records: Arc<dyn RecordStore>,
    /// Handshake-established session key material.
    pub sessions: Arc<dyn SessionStore>,
    /// Static configuration and the live tunables.
    pub config: ConfigHandle,
}

impl AppState {
    /// Connects to PostgreSQL and Redis and applies the schema.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn connect(config: ConfigHandle) -> Result<Self> {
        let pool = crate::db::create_pool(&config.config().database_url)?;
        crate::db::run_migrations(&pool).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let sessions = RedisSessionStore::connect(&config.config().redis_url).await?;

        Ok(Self::with_stores(
            Arc::new(PgRecordStore::new(pool)),
            Arc::new(sessions),
            config,
        ))
    }

    /// Builds state over already-constructed stores.
    pub fn with_stores(
        records: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionStore>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            records,
            sessions,
            config,
        }
    }

    /// Releases store connections.
    pub async fn close(&self) {
        self.records.close().await;
        self.sessions.close().await;
    }
}
