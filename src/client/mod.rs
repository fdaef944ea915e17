//! Client side of the protocol: the initiator handshake plus typed calls.

pub mod identity;
pub mod requests;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handshake::{EstablishedSession, RetryPolicy, initiator};
use crate::validation::messages::{
    CreateApplication, CreateLicense, CreateOwner, Credentials, LicenseValidate,
};

pub use self::requests::{Reply, parse_envelope, parse_plain};

/// A session with a server, established once and reused for each call.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    session: EstablishedSession,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct Verdict {
    context: i64,
}

#[derive(Deserialize)]
struct CreatedId {
    id: String,
}

#[derive(Deserialize)]
struct IssuedKey {
    key: String,
}

/// Tokens returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct Refreshed {
    token: String,
}

impl Client {
    /// Runs the hello exchange against `ws_url` and prepares HTTP calls to
    /// `base_url`.
    ///
    /// # Arguments
    ///
    /// * `ws_url` - The handshake endpoint, e.g. `ws://127.0.0.1:3000/hello`.
    /// * `base_url` - The HTTP origin, without a trailing slash.
    pub async fn connect(ws_url: &str, base_url: &str) -> Result<Self> {
        let (mut socket, _) = tokio_tungstenite::connect_async(ws_url).await?;
        let session = initiator::initiate(&mut socket, RetryPolicy::default()).await?;
        if let Err(e) = socket.close(None).await {
            tracing::debug!("Handshake socket close failed: {}", e);
        }

        let http = reqwest::Client::builder().cookie_store(true).build()?;
        tracing::debug!("🤝 Client session ready");

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            access_token: None,
        })
    }

    pub fn session(&self) -> &EstablishedSession {
        &self.session
    }

    /// Sends a raw request under the session.
    pub async fn request<T: Serialize>(
        &self,
        path: &str,
        body: Option<&T>,
        encrypted: bool,
    ) -> Result<Reply> {
        let payload = body.map(sonic_rs::to_vec).transpose()?;
        requests::send(
            &self.http,
            &self.base_url,
            &self.session,
            path,
            payload,
            encrypted,
            self.access_token.as_deref(),
        )
        .await
    }

    /// Validates a license. Returns the reply's `context` deadline.
    pub async fn validate_license(&self, msg: &LicenseValidate) -> Result<i64> {
        let reply = self.request("/license", Some(msg), true).await?;
        let verdict: Verdict = parse_envelope(&reply, Utc::now().timestamp())?;
        Ok(verdict.context)
    }

    /// Registers an account and returns its id.
    pub async fn register(&self, username: &str, password: &str, api_key: Option<&str>) -> Result<String> {
        let msg = Credentials {
            username: username.to_string(),
            password: password.to_string(),
            api_key: api_key.map(str::to_string),
        };
        let reply = self.request("/register", Some(&msg), true).await?;
        let created: CreatedId = parse_envelope(&reply, Utc::now().timestamp())?;
        Ok(created.id)
    }

    /// Logs in; later calls carry the access token.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginInfo> {
        let msg = Credentials {
            username: username.to_string(),
            password: password.to_string(),
            api_key: None,
        };
        let reply = self.request("/login", Some(&msg), true).await?;
        let info: LoginInfo = parse_envelope(&reply, Utc::now().timestamp())?;
        self.access_token = Some(info.token.clone());
        Ok(info)
    }

    /// Exchanges the refresh cookie for a new access token.
    pub async fn refresh(&mut self) -> Result<String> {
        let reply = self.request::<()>("/refresh", None, false).await?;
        let refreshed: Refreshed = parse_plain(&reply)?;
        self.access_token = Some(refreshed.token.clone());
        Ok(refreshed.token)
    }

    /// Revokes the refresh token and forgets the access token.
    pub async fn logout(&mut self) -> Result<()> {
        let reply = self.request::<()>("/logout", None, false).await?;
        parse_plain::<sonic_rs::Value>(&reply)?;
        self.access_token = None;
        Ok(())
    }

    /// Links an owner to an account. Needs an admin login.
    pub async fn create_owner(&self, user_id: &str) -> Result<String> {
        let msg = CreateOwner {
            user_id: user_id.to_string(),
        };
        let reply = self.request("/create-owner", Some(&msg), true).await?;
        let created: CreatedId = parse_envelope(&reply, Utc::now().timestamp())?;
        Ok(created.id)
    }

    pub async fn create_application(&self, owner_id: &str, name: &str) -> Result<String> {
        let msg = CreateApplication {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        };
        let reply = self.request("/create-application", Some(&msg), true).await?;
        let created: CreatedId = parse_envelope(&reply, Utc::now().timestamp())?;
        Ok(created.id)
    }

    /// Mints a license key.
    pub async fn create_license(&self, msg: &CreateLicense) -> Result<String> {
        let reply = self.request("/create-license", Some(msg), true).await?;
        let issued: IssuedKey = parse_envelope(&reply, Utc::now().timestamp())?;
        Ok(issued.key)
    }
}
