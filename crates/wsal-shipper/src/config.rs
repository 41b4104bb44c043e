//! Configuration management
//!
//! A configuration is a TOML file selected by name (`-c prod` reads
//! `<base_dir>/prod.toml`). Secrets may be supplied through the environment
//! instead of the file.

use crate::error::{Result, ShipperError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Configuration name used when `--config` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// WordPress table prefix used when the config does not set one.
pub const DEFAULT_TABLE_PREFIX: &str = "wp_";

/// Default database connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default S3 region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variable overriding `database.password`.
pub const ENV_DB_PASSWORD: &str = "WSAL_DB_PASSWORD";

/// Environment variables overriding the storage credentials.
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Full shipper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub site: SiteConfig,
}

/// WordPress database connection settings
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,

    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Driver-specific options merged into the connection (port, charset, ssl_mode, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// S3 (or S3-compatible) bucket settings
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for MinIO and other S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub path_style: bool,
}

/// Identity of the WordPress site being exported
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Logical domain used as a path segment of the uploaded object key
    pub domain: String,
}

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("table_prefix", &self.table_prefix)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl Config {
    /// Path of the configuration file for `name` under `base_dir`
    pub fn path_for(base_dir: &Path, name: &str) -> PathBuf {
        base_dir.join(format!("{}.toml", name))
    }

    /// Load, apply environment overrides and validate the named configuration
    pub fn load(base_dir: &Path, name: &str) -> Result<Self> {
        let path = Self::path_for(base_dir, name);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ShipperError::config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        let mut config = Self::from_toml(&raw)
            .map_err(|e| ShipperError::config(format!("'{}': {}", path.display(), e)))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration document without touching the environment
    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Let secrets come from the environment rather than the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(ENV_DB_PASSWORD) {
            self.database.password = password;
        }

        if let Ok(key) = std::env::var(ENV_ACCESS_KEY_ID) {
            self.storage.access_key_id = key;
        }

        if let Ok(secret) = std::env::var(ENV_SECRET_ACCESS_KEY) {
            self.storage.secret_access_key = secret;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("database.host", &self.database.host),
            ("database.user", &self.database.user),
            ("database.database", &self.database.database),
            ("storage.access_key_id", &self.storage.access_key_id),
            ("storage.secret_access_key", &self.storage.secret_access_key),
            ("storage.bucket", &self.storage.bucket),
            ("storage.region", &self.storage.region),
            ("site.domain", &self.site.domain),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ShipperError::config(format!("{} cannot be empty", field)));
            }
        }

        // The domain becomes a single path segment of the object key
        if self.site.domain.contains('/') {
            return Err(ShipperError::config(format!(
                "site.domain '{}' must not contain '/'",
                self.site.domain
            )));
        }

        if !self
            .database
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ShipperError::config(format!(
                "database.table_prefix '{}' may only contain letters, digits and '_'",
                self.database.table_prefix
            )));
        }

        if self.database.connect_timeout_secs == 0 {
            return Err(ShipperError::config(
                "database.connect_timeout_secs must be greater than 0",
            ));
        }

        Ok(())
    }
}
