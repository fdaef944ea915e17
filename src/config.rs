use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// Static process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// Address the HTTP and handshake listener binds to.
    pub bind_addr: String,
    /// Secret used to sign access and refresh tokens.
    pub jwt_secret: Zeroizing<String>,
    /// Registering with this key creates an admin account.
    pub api_key: Option<Zeroizing<String>>,
    /// Optional JSON file of hot-reloadable tunables.
    pub config_path: Option<PathBuf>,
    /// How often the tunables file is re-read.
    pub config_refresh: Duration,
}

/// Values that may change while the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    pub session_ttl_secs: u64,
    pub allowed_context_secs: i64,
    pub access_token_minutes: i64,
    pub refresh_token_minutes: i64,
    pub handshake_timeout_secs: u64,
    pub handshake_max_attempts: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            session_ttl_secs: 300,
            allowed_context_secs: 30,
            access_token_minutes: 15,
            refresh_token_minutes: 60 * 24 * 7,
            handshake_timeout_secs: 30,
            handshake_max_attempts: 5,
        }
    }
}

impl Tunables {
    /// Defaults overridden by any matching environment variables.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            session_ttl_secs: env_or("SESSION_TTL_SECS", d.session_ttl_secs)?,
            allowed_context_secs: env_or("ALLOWED_CONTEXT_SECS", d.allowed_context_secs)?,
            access_token_minutes: env_or("ACCESS_TOKEN_MINUTES", d.access_token_minutes)?,
            refresh_token_minutes: env_or("REFRESH_TOKEN_MINUTES", d.refresh_token_minutes)?,
            handshake_timeout_secs: env_or("HANDSHAKE_TIMEOUT_SECS", d.handshake_timeout_secs)?,
            handshake_max_attempts: env_or("HANDSHAKE_MAX_ATTEMPTS", d.handshake_max_attempts)?,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    fn with_overrides(mut self, file: TunablesFile) -> Self {
        if let Some(v) = file.session_ttl_secs {
            self.session_ttl_secs = v;
        }
        if let Some(v) = file.allowed_context_secs {
            self.allowed_context_secs = v;
        }
        if let Some(v) = file.access_token_minutes {
            self.access_token_minutes = v;
        }
        if let Some(v) = file.refresh_token_minutes {
            self.refresh_token_minutes = v;
        }
        if let Some(v) = file.handshake_timeout_secs {
            self.handshake_timeout_secs = v;
        }
        if let Some(v) = file.handshake_max_attempts {
            self.handshake_max_attempts = v.max(1);
        }
        self
    }
}

/// Shape of the tunables file. Absent keys keep the base value.
#[derive(Debug, Default, Deserialize)]
struct TunablesFile {
    session_ttl_secs: Option<u64>,
    allowed_context_secs: Option<i64>,
    access_token_minutes: Option<i64>,
    refresh_token_minutes: Option<i64>,
    handshake_timeout_secs: Option<u64>,
    handshake_max_attempts: Option<u32>,
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .context("JWT_SECRET must be set (generate with: licensegate gen)")?;
        if jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            jwt_secret: Zeroizing::new(jwt_secret),
            api_key: env::var("API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .map(Zeroizing::new),
            config_path: env::var("CONFIG_PATH").ok().map(PathBuf::from),
            config_refresh: Duration::from_secs(env_or("CONFIG_REFRESH_SECS", 5u64)?),
        })
    }

    /// A configuration with no backing services, for in-process stores.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            redis_url: String::new(),
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: Zeroizing::new(jwt_secret.to_string()),
            api_key: None,
            config_path: None,
            config_refresh: Duration::from_secs(5),
        }
    }
}

/// Shared access to the static config and the current tunables snapshot.
#[derive(Clone)]
pub struct ConfigHandle {
    config: Arc<Config>,
    base: Tunables,
    tx: Arc<watch::Sender<Tunables>>,
    rx: watch::Receiver<Tunables>,
}

impl ConfigHandle {
    pub fn new(config: Config, base: Tunables) -> Self {
        let (tx, rx) = watch::channel(base);
        Self {
            config: Arc::new(config),
            base,
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The tunables in effect right now.
    pub fn tunables(&self) -> Tunables {
        *self.rx.borrow()
    }

    /// Re-reads the tunables file and publishes the result.
    ///
    /// On error the previous snapshot stays in effect.
    pub async fn reload_from(&self, path: &Path) -> Result<Tunables> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let file: TunablesFile = sonic_rs::from_slice(&raw)
            .with_context(|| format!("Invalid tunables in {}", path.display()))?;

        let next = self.base.with_overrides(file);
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        Ok(next)
    }

    /// Spawns the periodic reload task, if a tunables file is configured.
    pub fn spawn_refresh(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let path = self.config.config_path.clone()?;
        let every = self.config.config_refresh;
        let handle = self.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("🛑 Config refresh task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match handle.reload_from(&path).await {
                            Ok(t) => tracing::debug!("Tunables refreshed: {:?}", t),
                            Err(e) => tracing::warn!("⚠️  Keeping previous tunables: {:#}", e),
                        }
                    }
                }
            }
        }))
    }
}
