/*
 * Responsibility
 * - 環境変数の読み込み (.env 対応): listen port、CORS、ログ、
 *   Auth0 bearer 検証、DB (任意)、メトリクスのエンドポイント
 * - 設定値のバリデーション (不足/不正なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use thiserror::Error;

use crate::database::{AuthType, DatabaseConfig};
use crate::logger::LogLevel;
use crate::middleware::metrics::DEFAULT_PATH as DEFAULT_METRICS_PATH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LogConfig {
    /// JSON output is forced in production regardless of `LOG_FORMAT`.
    pub fn from_env(app_env: AppEnv) -> Self {
        let level = LogLevel::parse(&env::var("LOG_LEVEL").unwrap_or_default());
        let format = match env::var("LOG_FORMAT").unwrap_or_default().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ if app_env.is_production() => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self { level, format }
    }
}

/// Bearer-token verification settings for an Auth0 tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth0Config {
    /// Tenant domain, e.g. `your-tenant.auth0.com` (no scheme).
    pub domain: String,
    pub audience: String,
    pub enabled: bool,
    pub leeway_seconds: u64,
}

impl Auth0Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let enabled = match env::var("AUTH0_ENABLED") {
            Ok(v) => parse_bool(&v).ok_or(ConfigError::Invalid("AUTH0_ENABLED"))?,
            Err(_) => false,
        };

        let config = Self {
            domain: env::var("AUTH0_DOMAIN").unwrap_or_default().trim().to_string(),
            audience: env::var("AUTH0_AUDIENCE").unwrap_or_default().trim().to_string(),
            enabled,
            leeway_seconds: parse_or("AUTH0_LEEWAY_SECONDS", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Domain and audience are only required when verification is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.domain.is_empty() {
            return Err(ConfigError::Missing("AUTH0_DOMAIN"));
        }
        if self.audience.is_empty() {
            return Err(ConfigError::Missing("AUTH0_AUDIENCE"));
        }
        Ok(())
    }

    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain)
    }

    pub fn userinfo_url(&self) -> String {
        format!("https://{}/userinfo", self.domain)
    }

    /// Accepted `iss` values: with and without the trailing slash.
    pub fn issuers(&self) -> [String; 2] {
        [
            format!("https://{}/", self.domain),
            format!("https://{}", self.domain),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub cors_allowed_origins: Vec<String>,
    pub cors_max_age: Duration,

    pub log: LogConfig,
    pub auth0: Auth0Config,
    // DB_HOST 未設定なら None
    pub database: Option<DatabaseConfig>,
    // METRICS_ENABLED=false なら None
    pub metrics_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = parse_or("PORT", 8080)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = split_list(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default());
        let cors_max_age = Duration::from_secs(parse_or("CORS_MAX_AGE_SECONDS", 600)?);

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            cors_max_age,
            log: LogConfig::from_env(app_env),
            auth0: Auth0Config::from_env()?,
            database: database_from_env()?,
            metrics_path: metrics_path_from_env()?,
        })
    }
}

/// `METRICS_ENABLED` (default on) and `METRICS_PATH` (default `/metrics`).
fn metrics_path_from_env() -> Result<Option<String>, ConfigError> {
    let enabled = match env::var("METRICS_ENABLED") {
        Ok(v) => parse_bool(&v).ok_or(ConfigError::Invalid("METRICS_ENABLED"))?,
        Err(_) => true,
    };
    if !enabled {
        return Ok(None);
    }
    let path = env::var("METRICS_PATH").unwrap_or_default();
    metrics_path(&path).map(Some)
}

fn metrics_path(value: &str) -> Result<String, ConfigError> {
    match value.trim() {
        "" => Ok(DEFAULT_METRICS_PATH.to_string()),
        p if p.starts_with('/') => Ok(p.to_string()),
        _ => Err(ConfigError::Invalid("METRICS_PATH")),
    }
}

fn database_from_env() -> Result<Option<DatabaseConfig>, ConfigError> {
    let host = match env::var("DB_HOST") {
        Ok(h) if !h.trim().is_empty() => h.trim().to_string(),
        _ => return Ok(None),
    };

    let auth_type = match env::var("DB_AUTH_TYPE") {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<AuthType>().map_err(|_| ConfigError::Invalid("DB_AUTH_TYPE"))?
        }
        _ => AuthType::Password,
    };

    Ok(Some(DatabaseConfig {
        host,
        port: parse_or("DB_PORT", 5432)?,
        name: env::var("DB_NAME").map_err(|_| ConfigError::Missing("DB_NAME"))?,
        user: env::var("DB_USER").map_err(|_| ConfigError::Missing("DB_USER"))?,
        password: env::var("DB_PASSWORD").unwrap_or_default(),
        auth_type,
        ssl_mode: env::var("DB_SSL_MODE").unwrap_or_else(|_| "disable".to_string()),
        max_open_conns: parse_or("DB_MAX_OPEN_CONNS", 25)?,
        max_idle_conns: parse_or("DB_MAX_IDLE_CONNS", 5)?,
        conn_max_lifetime: Duration::from_secs(parse_or("DB_CONN_MAX_LIFETIME_SECONDS", 300)?),
        conn_max_idle_time: Duration::from_secs(parse_or("DB_CONN_MAX_IDLE_TIME_SECONDS", 60)?),
    }))
}

/// Unset means default; set-but-unparsable is an error.
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        _ => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Comma-separated list, entries trimmed, empties dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
