//! Shared unit-test helpers: RSA fixtures, token minting, stub auth services,
//! log capture and router plumbing.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::JsonFields;

use crate::config::{AppEnv, Auth0Config, Config, LogConfig, LogFormat};
use crate::logger::{FlatJson, LogLevel};
use crate::services::auth::{
    KeySetError, KeySetProvider, Profile, UserInfoClient, UserInfoError, VerifierSettings,
};

pub const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
pub const FOREIGN_KEY_PEM: &str = include_str!("../tests/fixtures/foreign_key.pem");
pub const JWKS_JSON: &str = include_str!("../tests/fixtures/jwks.json");

pub const TEST_KID: &str = "test-key-1";
pub const TEST_AUDIENCE: &str = "https://api.example.com";
pub const TEST_DOMAIN: &str = "tenant.example.com";

// ---- config ----

pub fn test_auth0_config() -> Auth0Config {
    Auth0Config {
        domain: TEST_DOMAIN.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        enabled: true,
        leeway_seconds: 60,
    }
}

pub fn test_settings() -> VerifierSettings {
    VerifierSettings::from_config(&test_auth0_config())
}

pub fn test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        app_env: AppEnv::Development,
        cors_allowed_origins: Vec::new(),
        cors_max_age: Duration::from_secs(600),
        log: LogConfig {
            level: LogLevel::Debug,
            format: LogFormat::Text,
        },
        auth0: test_auth0_config(),
        database: None,
        metrics_path: None,
    }
}

// ---- tokens ----

/// Valid claims for the test tenant, overridden by `extra`.
pub fn claims(extra: Value) -> Value {
    let now = chrono::Utc::now().timestamp();
    let mut claims = serde_json::json!({
        "iss": format!("https://{TEST_DOMAIN}/"),
        "aud": TEST_AUDIENCE,
        "sub": "auth0|ada",
        "exp": now + 3600,
        "iat": now,
    });
    if let (Some(base), Value::Object(extra)) = (claims.as_object_mut(), extra) {
        base.extend(extra);
    }
    claims
}

/// RS256 token signed with the fixture key under [`TEST_KID`].
pub fn mint_token(claims: Value) -> String {
    let header = Header {
        kid: Some(TEST_KID.to_string()),
        ..Header::new(Algorithm::RS256)
    };
    mint_token_with(SIGNING_KEY_PEM, header, claims)
}

pub fn mint_token_with(pem: &str, header: Header, claims: Value) -> String {
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key");
    jsonwebtoken::encode(&header, &claims, &key).expect("token")
}

// ---- stub auth services ----

/// Serves the fixture key set and counts forced refreshes.
#[derive(Debug)]
pub struct StaticKeySet {
    keys: Arc<JwkSet>,
    refreshes: AtomicUsize,
}

impl StaticKeySet {
    pub fn fixture() -> Self {
        let keys: JwkSet = serde_json::from_str(JWKS_JSON).expect("fixture key set");
        Self {
            keys: Arc::new(keys),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetProvider for StaticKeySet {
    async fn key_set(&self, _url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        Ok(self.keys.clone())
    }

    async fn refresh(&self, _url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.clone())
    }
}

/// Canned userinfo responses.
#[derive(Debug)]
pub struct StubUserInfo {
    profile: Option<Profile>,
    calls: AtomicUsize,
}

impl StubUserInfo {
    pub fn returning(profile: Value) -> Self {
        Self {
            profile: Some(serde_json::from_value(profile).expect("profile")),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            profile: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserInfoClient for StubUserInfo {
    async fn fetch(&self, _access_token: &str) -> Result<Profile, UserInfoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profile.clone().ok_or(UserInfoError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

// ---- http ----

pub async fn send(router: Router, req: Request<Body>) -> Response {
    router.oneshot(req).await.expect("infallible")
}

pub async fn body_json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

// ---- logs ----

/// In-memory JSON log sink for `tracing::subscriber::with_default`.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .fmt_fields(JsonFields::new())
            .event_format(FlatJson)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish()
    }

    pub fn json_lines(&self) -> Vec<Value> {
        let buf = self.buf.lock().expect("log buffer");
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).expect("json log line"))
            .collect()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(self.buf.clone())
    }
}
