use std::sync::Arc;

use chrono::Utc;
use zeroize::Zeroizing;

use licensegate::client::Client;
use licensegate::config::{Config, ConfigHandle, Tunables};
use licensegate::envelope::integrity::IntegrityStatus;
use licensegate::error::{AppError, ErrorKind};
use licensegate::state::AppState;
use licensegate::store::memory::{MemoryRecordStore, MemorySessionStore};
use licensegate::validation::messages::{CreateLicense, LicenseValidate};
use licensegate::build_router;

const ADMIN_KEY: &str = "e2e-admin-key";
const PASSWORD: &str = "Passw0rd!";

// Shared test context
struct TestContext {
    base_url: String,
    ws_url: String,
}

impl TestContext {
    async fn start() -> Self {
        let mut config = Config::local("e2e-jwt-secret");
        config.api_key = Some(Zeroizing::new(ADMIN_KEY.to_string()));

        let state = AppState::with_stores(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemorySessionStore::new()),
            ConfigHandle::new(config, Tunables::default()),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            ws_url: format!("ws://{}/hello", addr),
        }
    }

    async fn client(&self) -> Client {
        Client::connect(&self.ws_url, &self.base_url).await.unwrap()
    }
}

struct Issued {
    owner_id: String,
    app_id: String,
    key: String,
}

/// Registers an admin vendor and issues one license through the API.
async fn issue_license(ctx: &TestContext) -> Issued {
    let mut vendor = ctx.client().await;
    let account_id = vendor.register("vendor", PASSWORD, Some(ADMIN_KEY)).await.unwrap();
    vendor.login("vendor", PASSWORD).await.unwrap();

    let owner_id = vendor.create_owner(&account_id).await.unwrap();
    let app_id = vendor.create_application(&owner_id, "desktop-app").await.unwrap();
    let key = vendor
        .create_license(&CreateLicense {
            owner_id: owner_id.clone(),
            app_id: app_id.clone(),
            name: "desktop-app".to_string(),
            expiry: 3600,
            mask: None,
            include_capitals: true,
            include_lowercase: false,
        })
        .await
        .unwrap();

    Issued {
        owner_id,
        app_id,
        key,
    }
}

fn validation(issued: &Issued, fingerprint: &str) -> LicenseValidate {
    LicenseValidate {
        integrity_signature: "a1b2c3".to_string(),
        fingerprint: fingerprint.to_string(),
        app_id: issued.app_id.clone(),
        owner_id: issued.owner_id.clone(),
        license_key: issued.key.clone(),
    }
}

#[tokio::test]
async fn license_binds_to_the_first_device() {
    let ctx = TestContext::start().await;
    let issued = issue_license(&ctx).await;

    let first = ctx.client().await;
    let context = first.validate_license(&validation(&issued, "f1")).await.unwrap();
    assert!(context > Utc::now().timestamp());

    let again = ctx.client().await;
    again.validate_license(&validation(&issued, "f1")).await.unwrap();

    let other = ctx.client().await;
    match other.validate_license(&validation(&issued, "f2")).await {
        Err(AppError::Rejected { status, message }) => {
            assert_eq!(status, 200);
            assert_eq!(message, ErrorKind::InvalidFingerprint.message());
        }
        other => panic!("expected a fingerprint rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn sealed_replies_carry_valid_signatures() {
    let ctx = TestContext::start().await;
    let issued = issue_license(&ctx).await;

    let client = ctx.client().await;
    let reply = client
        .request("/license", Some(&validation(&issued, "f1")), true)
        .await
        .unwrap();
    assert!(reply.is_ok());
    assert_eq!(reply.integrity, Some(IntegrityStatus::Valid));

    let rejected = client
        .request("/license", Some(&validation(&issued, "f2")), true)
        .await
        .unwrap();
    assert_eq!(rejected.integrity, Some(IntegrityStatus::Valid));
    let body = String::from_utf8(rejected.body).unwrap();
    assert!(body.contains(r#""success":false"#), "unexpected body: {body}");
}

#[tokio::test]
async fn requests_without_a_session_get_plain_errors() {
    let ctx = TestContext::start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/license", ctx.base_url))
        .header("x-session-id", "no-such-session")
        .body("00ff")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(response.headers().get("x-signature").is_none());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], ErrorKind::NoSession.message());
}

#[tokio::test]
async fn refresh_and_logout_follow_the_cookie() {
    let ctx = TestContext::start().await;
    let mut client = ctx.client().await;
    client.register("alice", PASSWORD, None).await.unwrap();
    let login = client.login("alice", PASSWORD).await.unwrap();

    let token = client.refresh().await.unwrap();
    assert!(!token.is_empty());
    assert_ne!(token, login.refresh_token);

    client.logout().await.unwrap();
    assert!(client.refresh().await.is_err());
}

#[tokio::test]
async fn non_admins_cannot_create_owners() {
    let ctx = TestContext::start().await;
    let mut client = ctx.client().await;
    let id = client.register("mallory", PASSWORD, Some("wrong-key")).await.unwrap();
    client.login("mallory", PASSWORD).await.unwrap();

    let err = client.create_owner(&id).await.unwrap_err();
    match err {
        AppError::Rejected { message, .. } => assert_eq!(message, ErrorKind::Unauthorized.message()),
        other => panic!("unexpected error: {other}"),
    }
}
