use std::{env, fmt, path::PathBuf, str::FromStr};

use thiserror::Error;

/// Default listen address. Matches the port the admin client has always targeted.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_SESSION_TTL_MINS: i64 = 8 * 60;
const DEFAULT_ACCESS_TTL_MINS: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// handed to every component through `AppState`; nothing reads the environment after
/// `from_env` returns.
///
/// Signing secrets have no fallback value. A deployment that forgets to provide them
/// refuses to start instead of running with a guessable key.
#[derive(Clone)]
pub struct AppConfig {
    /// Runtime environment marker. Selects the log format.
    pub env: Env,
    /// Postgres connection string.
    pub db_url: String,
    pub db_max_connections: u32,
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// HMAC key for session and access tokens.
    pub jwt_secret: String,
    /// Separate HMAC key for refresh tokens.
    pub jwt_refresh_secret: String,
    pub session_token_ttl_mins: i64,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    /// Directory uploaded cover images are written to and served from.
    pub upload_dir: PathBuf,
    /// Request body cap for the multipart work endpoints.
    pub max_upload_bytes: usize,
    /// When false, `POST /api/admin/register` answers 403.
    pub allow_registration: bool,
    pub request_timeout_secs: u64,
}

/// Env
///
/// Defines the runtime context. `Local` logs in a human-readable format,
/// `Production` emits JSON lines for log aggregation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("db_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_refresh_secret", &"<redacted>")
            .field("session_token_ttl_mins", &self.session_token_ttl_mins)
            .field("access_token_ttl_mins", &self.access_token_ttl_mins)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("allow_registration", &self.allow_registration)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// from_env
    ///
    /// Reads the configuration from process environment variables. Call
    /// `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// from_lookup
    ///
    /// Builds the configuration from an arbitrary key lookup. `from_env` is a thin
    /// wrapper over this; tests feed it a map instead of mutating the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        let jwt_refresh_secret = required(&lookup, "JWT_REFRESH_SECRET")?;
        if jwt_secret == jwt_refresh_secret {
            return Err(ConfigError::Invalid {
                var: "JWT_REFRESH_SECRET",
                reason: "must differ from JWT_SECRET".to_string(),
            });
        }

        let config = Self {
            env,
            db_url: required(&lookup, "DATABASE_URL")?,
            db_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            jwt_refresh_secret,
            session_token_ttl_mins: parsed(&lookup, "SESSION_TOKEN_TTL_MINS", DEFAULT_SESSION_TTL_MINS)?,
            access_token_ttl_mins: parsed(&lookup, "ACCESS_TOKEN_TTL_MINS", DEFAULT_ACCESS_TTL_MINS)?,
            refresh_token_ttl_days: parsed(&lookup, "REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TTL_DAYS)?,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            allow_registration: flag(&lookup, "ALLOW_ADMIN_REGISTRATION", true)?,
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
        };

        for (var, value) in [
            ("SESSION_TOKEN_TTL_MINS", config.session_token_ttl_mins),
            ("ACCESS_TOKEN_TTL_MINS", config.access_token_ttl_mins),
            ("REFRESH_TOKEN_TTL_DAYS", config.refresh_token_ttl_days),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be positive".to_string(),
                });
            }
        }
        if config.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(config)
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parsed<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

fn flag<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}
