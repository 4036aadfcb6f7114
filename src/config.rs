use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::pagination::parse_bool;

const DAY_SECS: u64 = 24 * 60 * 60;

/// ConfigError
///
/// Raised by `AppConfig::load` when a variable is present but unusable, or when a
/// setting the production environment requires is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// AppConfig
///
/// Holds the application's entire configuration state. It is immutable once loaded
/// and is pulled into handlers and middleware via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    pub port: u16,
    // Postgres connection string. The in-memory repository is used when absent.
    pub db_url: Option<String>,
    // S3-compatible storage endpoint URL (MinIO in local).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // The bucket holding image bytes.
    pub s3_bucket: String,
    // When true, a well-formed bearer token that fails to resolve aborts the request with 401.
    // When false the request proceeds anonymously.
    pub strict_bearer_validation: bool,
    // Page size used by list endpoints when `limit` is absent.
    pub default_page_limit: usize,
    pub request_timeout: Duration,
    pub device_ttl: Duration,
    pub token_ttl: Duration,
    // How often expired devices and tokens are purged from the store.
    pub expiry_sweep_interval: Duration,
}

/// Env
///
/// Defines the runtime context, used to switch between development conveniences
/// (pretty logs, MinIO defaults, in-memory store) and production infrastructure.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Local settings with no database, used for test setup and as the base that
    /// `load` overrides.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 3000,
            db_url: None,
            // Default MinIO credentials for local/testing convenience.
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "entity-images".to_string(),
            strict_bearer_validation: false,
            default_page_limit: 100,
            request_timeout: Duration::from_secs(30),
            device_ttl: Duration::from_secs(30 * DAY_SECS),
            token_ttl: Duration::from_secs(30 * DAY_SECS),
            expiry_sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Local runs fall back to
    /// the defaults above; production refuses to start without a database and
    /// explicit storage credentials.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        // Settings that have a local fallback but must be explicit in production.
        let required = |name: &'static str, fallback: &str| -> Result<String, ConfigError> {
            match (var(name), env) {
                (Some(value), _) => Ok(value),
                (None, Env::Production) => Err(ConfigError::Missing(name)),
                (None, Env::Local) => Ok(fallback.to_string()),
            }
        };

        let db_url = var("DATABASE_URL");
        if env == Env::Production && db_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let default_page_limit = parsed("DEFAULT_PAGE_LIMIT", defaults.default_page_limit)?;
        if default_page_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "DEFAULT_PAGE_LIMIT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            env,
            port: parsed("PORT", defaults.port)?,
            db_url,
            s3_endpoint: required("S3_ENDPOINT", &defaults.s3_endpoint)?,
            s3_region: var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_key: required("S3_ACCESS_KEY", &defaults.s3_key)?,
            s3_secret: required("S3_SECRET_KEY", &defaults.s3_secret)?,
            s3_bucket: required("S3_BUCKET_NAME", &defaults.s3_bucket)?,
            strict_bearer_validation: flag(
                "STRICT_BEARER_VALIDATION",
                defaults.strict_bearer_validation,
            )?,
            default_page_limit,
            request_timeout: seconds("REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            device_ttl: seconds("DEVICE_TTL_SECS", defaults.device_ttl)?,
            token_ttl: seconds("TOKEN_TTL_SECS", defaults.token_ttl)?,
            expiry_sweep_interval: seconds(
                "EXPIRY_SWEEP_SECS",
                defaults.expiry_sweep_interval,
            )?,
        })
    }
}

/// Reads a variable, treating empty values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match var(name) {
        Some(value) => parse_bool(value.trim()).ok_or_else(|| ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean".to_string(),
        }),
        None => Ok(default),
    }
}

fn seconds(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = parsed(name, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
