use std::fs;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Bearer token lifetime. A token older than this fails validation and
    /// there is no refresh — the client must log in again.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_minutes: u64,

    /// HMAC key used to sign and verify JWTs.
    ///
    /// Prefer loading this via the `JWT_SECRET` environment variable.  This
    /// config field is the fallback for deployments that cannot inject env
    /// vars at runtime.
    ///
    /// **Minimum length:** 32 characters.
    /// Rotating the secret invalidates every outstanding token, so it is
    /// read exactly once at startup.
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:1337"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    /// Token expiry converted to seconds — convenience for `expires_in`
    /// fields in login responses.
    pub fn token_expiry_secs(&self) -> u64 {
        self.token_expiry_minutes * 60
    }

    /// Resolve the JWT secret with the `JWT_SECRET` env var taking priority
    /// over the config file field.
    ///
    /// Returns `None` when neither source is set (startup treats this as a
    /// hard error).
    pub fn resolved_jwt_secret(&self) -> Option<String> {
        std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.jwt_secret.clone())
            .filter(|s| !s.is_empty())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_expiry_minutes: default_token_expiry(),
            jwt_secret: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate configuration from a TOML file.
///
/// A missing file is not an error: the defaults cover everything except the
/// JWT secret, which can still arrive via the `JWT_SECRET` env var.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let config = match fs::read_to_string(path) {
        Ok(contents) => {
            info!("Loading configuration from: {}", path);
            if contents.trim().is_empty() {
                return Err(ConfigError::InvalidConfig("empty file".into()));
            }
            let config: AppConfig = toml::from_str(&contents)?;
            debug!("Config: {:?}", config);
            config
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No config file at {}, using defaults", path);
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    validate_config(&config)?;
    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.database.path.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "database.path cannot be empty".into(),
        ));
    }

    if config.auth.token_expiry_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "token_expiry_minutes must be greater than 0".into(),
        ));
    }

    // JWT secret must be resolvable (env var or config field) and long
    // enough.  Rejected here so a bad deployment fails at startup rather
    // than at the first login.
    match config.auth.resolved_jwt_secret() {
        None => {
            return Err(ConfigError::InvalidConfig(
                "jwt_secret must be set via the JWT_SECRET env var or auth.jwt_secret config field"
                    .into(),
            ));
        }
        Some(secret) if secret.len() < 32 => {
            return Err(ConfigError::InvalidConfig(
                "jwt_secret must be at least 32 characters long".into(),
            ));
        }
        _ => {}
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1337
}

fn default_db_path() -> String {
    "blog.db".to_string()
}

fn default_token_expiry() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret(secret: Option<&str>) -> AppConfig {
        AppConfig {
            auth: AuthConfig {
                token_expiry_minutes: 30,
                jwt_secret: secret.map(|s| s.to_string()),
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn default_token_expiry_is_thirty_minutes() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.auth.token_expiry_minutes, 30);
        assert_eq!(cfg.auth.token_expiry_secs(), 1800);
    }

    #[test]
    fn missing_secret_fails_validation() {
        let cfg = config_with_secret(None);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn short_secret_fails_validation() {
        let cfg = config_with_secret(Some("too-short"));
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn long_secret_passes_validation() {
        let cfg = config_with_secret(Some("0123456789abcdef0123456789abcdef"));
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn zero_expiry_fails_validation() {
        let mut cfg = config_with_secret(Some("0123456789abcdef0123456789abcdef"));
        cfg.auth.token_expiry_minutes = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn toml_round_trip() {
        let toml = r#"
            [server]
            bind = "0.0.0.0"
            port = 8080

            [database]
            path = "/tmp/test.db"

            [auth]
            token_expiry_minutes = 15
            jwt_secret = "0123456789abcdef0123456789abcdef"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.database.path, "/tmp/test.db");
        assert_eq!(cfg.auth.token_expiry_minutes, 15);
    }
}
