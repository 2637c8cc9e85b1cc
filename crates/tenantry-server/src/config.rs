//! Server configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `tenantry.toml`
//! in the working directory (or the file named by `TENANTRY_CONFIG`),
//! then `TENANTRY_*` environment variables. Nested keys use a double
//! underscore, e.g. `TENANTRY_AUTH__ACCESS_TOKEN_SECRET`.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tenantry_auth::AuthConfig;
use tenantry_db::DbConfig;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "tenantry.toml";
pub const ENV_PREFIX: &str = "TENANTRY_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Return infrastructure error messages in 500 responses. Keep off in
    /// production.
    pub expose_error_detail: bool,
    /// Capacity of the task event channel.
    pub event_capacity: usize,
    pub auth: AuthConfig,
    pub db: DbConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            expose_error_detail: false,
            event_capacity: 256,
            auth: AuthConfig::default(),
            db: DbConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(format!("{ENV_PREFIX}CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(path)
    }

    /// Load with `path` as the TOML layer. A missing file is skipped.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: ServerConfig = Self::figment(path.as_ref())
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address must be set".into()));
        }
        self.auth
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
