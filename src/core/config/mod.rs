//! Process configuration.
//!
//! Resolved once at start-up from, in increasing precedence: built-in
//! defaults, an optional `crmserver.toml`, and `CRM_*` environment variables
//! (`__` separates nesting, e.g. `CRM_AUTH__JWT_SECRET`, `CRM_DATABASE__URL`).

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "crmserver.toml";
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Without a URL the server runs on the in-memory store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub issuer: String,
    pub audience: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_hours: 5,
            issuer: "crmserver".into(),
            audience: "crmserver-api".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:3000".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,crmserver=debug,tower_http=info".into(),
        }
    }
}

impl AppConfig {
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("CRM_").split("__"))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(config_file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .context("Failed to read configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} characters (set CRM_AUTH__JWT_SECRET)"
            );
        }
        if self.auth.token_expiry_hours <= 0 {
            bail!("auth.token_expiry_hours must be positive");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be positive");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
