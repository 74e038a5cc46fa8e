use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemoConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Secrets and credential lifetimes. The secret key signs session JWTs and
/// must be overridden in any real deployment (`MNEMO_SECRET_KEY`).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub session_ttl_minutes: u64,
    pub ai_token_ttl_days: u64,
    /// Hourly request ceiling for AI-issued tokens.
    pub ai_rate_limit_per_hour: u32,
    /// Hourly request ceiling for tokens issued without an explicit limit.
    pub default_rate_limit_per_hour: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8420,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemo_dir()
            .join("mnemo.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "change-this-secret-key".into(),
            session_ttl_minutes: 30,
            ai_token_ttl_days: 365,
            ai_rate_limit_per_hour: 1000,
            default_rate_limit_per_hour: 5,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Returns `~/.mnemo/`
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_DB, MNEMO_SECRET_KEY,
    /// MNEMO_LOG_LEVEL, MNEMO_PORT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMO_SECRET_KEY") {
            self.auth.secret_key = val;
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MNEMO_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
