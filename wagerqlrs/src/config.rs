//! Configuration for the analytics engine.
//!
//! TOML file with one table per concern. Every field has a default, so an
//! empty file (or no file at all) yields a usable configuration apart from the
//! store URL and auth secret, which usually come from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_AUTH_HEADER;
use crate::compiler::CountStrategy;
use crate::error::{EngineError, Result};
use crate::pagination::{PageLimits, DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};

pub const CONFIG_ENV: &str = "WAGERQL_CONFIG";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const AUTH_SECRET_ENV: &str = "WAGERQL_AUTH_SECRET";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub store: StoreConfig,
    pub pool: PoolConfig,
    pub auth: AuthConfig,
    pub registry: RegistryConfig,
}

/// Page sizing and count semantics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when the request has none (default: 250).
    pub default_page_size: u64,
    /// Largest page size a caller may ask for (default: 10000).
    pub max_page_size: u64,
    pub count_strategy: CountStrategy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// PostgreSQL URL or key-value connection string.
    pub url: Option<String>,
    /// Overrides the registry's table, e.g. `analytics.bet_transactions`.
    pub table: Option<String>,
    /// Per-statement timeout in milliseconds (0 = none).
    pub statement_timeout_ms: u64,
}

/// Connection pooling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum pool size (default: 16).
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: Option<String>,
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// YAML column allow-list; the builtin registry is used when unset.
    pub path: Option<PathBuf>,
    /// Check registry columns against the live table at startup.
    pub validate_on_startup: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            count_strategy: CountStrategy::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: None,
            statement_timeout_ms: 30_000,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 16 }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            header: DEFAULT_AUTH_HEADER.to_string(),
        }
    }
}

impl QueryConfig {
    pub fn page_limits(&self) -> Result<PageLimits> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(EngineError::Config(
                "page sizes must be at least 1".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(EngineError::Config(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        })
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations, then apply environment overrides.
    ///
    /// Search order:
    /// 1. `WAGERQL_CONFIG` environment variable
    /// 2. `./wagerql.toml` (current directory)
    /// 3. `~/.config/wagerql/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        let mut cfg = Self::locate().unwrap_or_else(|| {
            tracing::debug!("no config file found, using defaults");
            Self::default()
        });
        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg
    }

    fn locate() -> Option<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from WAGERQL_CONFIG");
                    return Some(cfg);
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring WAGERQL_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("wagerql.toml") {
            tracing::info!("loaded config from ./wagerql.toml");
            return Some(cfg);
        }

        let user_config = dirs::config_dir()?.join("wagerql").join("config.toml");
        let cfg = Self::from_file(&user_config).ok()?;
        tracing::info!(path = %user_config.display(), "loaded config from user config dir");
        Some(cfg)
    }

    /// Overlay values from the environment. `lookup` is `std::env::var` outside tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!("store url taken from DATABASE_URL");
            self.store.url = Some(url);
        }
        if let Some(secret) = lookup(AUTH_SECRET_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!("auth secret taken from WAGERQL_AUTH_SECRET");
            self.auth.secret = Some(secret);
        }
    }

    pub fn store_url(&self) -> Result<&str> {
        self.store
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| EngineError::Config("store.url is not set".to_string()))
    }

    pub fn auth_secret(&self) -> Result<&str> {
        self.auth
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| EngineError::Config("auth.secret is not set".to_string()))
    }
}
