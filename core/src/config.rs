use crate::credentials::StorageCredentials;
use crate::errors::{TableError, TableResult};
use crate::types::WriteMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TABLE_NAME: &str = "phpsess";
pub const DEFAULT_PARTITION_NAME: &str = "sessions";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Conventional session gc lifetime (24 minutes)
pub const DEFAULT_GC_LIFETIME_SECS: u64 = 1440;

/// Configuration for the table-backed session store
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub connection_string: Option<String>,
    pub table_endpoint: Option<String>,
    pub table_name: Option<String>,
    pub partition_name: Option<String>,
    pub write_mode: Option<WriteMode>,
    pub request_timeout_secs: Option<u64>,
    pub gc_lifetime_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account_name: None,
            account_key: None,
            connection_string: None,
            table_endpoint: None,
            table_name: Some(DEFAULT_TABLE_NAME.to_string()),
            partition_name: Some(DEFAULT_PARTITION_NAME.to_string()),
            write_mode: Some(WriteMode::default()),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            gc_lifetime_secs: Some(DEFAULT_GC_LIFETIME_SECS),
        }
    }
}

impl SessionConfig {
    /// Loads `.env`, then the config file (explicit path or the default location),
    /// then overlays environment variables.
    pub fn load(path: Option<&Path>) -> TableResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => get_default_config_file("tablesess")?,
        };

        let file_config = Self::load_from_file(&path)?;
        Ok(file_config.overlay_env(|key| std::env::var(key).ok()))
    }

    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> TableResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                TableError::Config(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                TableError::Config(format!("Failed to parse config file: {}", e))
            })?;

            // Fields missing from the file fall back to defaults
            Ok(Self::default().merge(&config))
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> TableResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            TableError::Config(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TableError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            TableError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            account_name: other.account_name.clone().or_else(|| self.account_name.clone()),
            account_key: other.account_key.clone().or_else(|| self.account_key.clone()),
            connection_string: other
                .connection_string
                .clone()
                .or_else(|| self.connection_string.clone()),
            table_endpoint: other
                .table_endpoint
                .clone()
                .or_else(|| self.table_endpoint.clone()),
            table_name: other.table_name.clone().or_else(|| self.table_name.clone()),
            partition_name: other
                .partition_name
                .clone()
                .or_else(|| self.partition_name.clone()),
            write_mode: other.write_mode.or(self.write_mode),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            gc_lifetime_secs: other.gc_lifetime_secs.or(self.gc_lifetime_secs),
        }
    }

    /// Overlays values taken from environment variables.
    ///
    /// An account name or key from the environment that yields a complete
    /// account/key pair replaces a connection string from the file, so the
    /// environment always decides which account is used. A connection string
    /// from the environment still wins over everything.
    pub fn overlay_env<F>(&self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = Self {
            account_name: lookup("AZURE_STORAGE_ACCOUNT"),
            account_key: lookup("AZURE_STORAGE_KEY"),
            connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING"),
            table_endpoint: lookup("TABLESESS_TABLE_ENDPOINT"),
            table_name: lookup("TABLESESS_TABLE"),
            partition_name: lookup("TABLESESS_PARTITION"),
            write_mode: None,
            request_timeout_secs: None,
            gc_lifetime_secs: None,
        };
        let env_account = from_env.account_name.is_some() || from_env.account_key.is_some();
        let mut merged = self.merge(&from_env);
        if env_account
            && from_env.connection_string.is_none()
            && merged.account_name.is_some()
            && merged.account_key.is_some()
        {
            debug!("Account from environment overrides configured connection string");
            merged.connection_string = None;
        }
        merged
    }

    pub fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }

    pub fn partition_name(&self) -> &str {
        self.partition_name.as_deref().unwrap_or(DEFAULT_PARTITION_NAME)
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode.unwrap_or_default()
    }

    /// Per-request timeout; zero is rejected
    pub fn request_timeout(&self) -> TableResult<Duration> {
        match self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS) {
            0 => Err(TableError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            )),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    pub fn gc_lifetime(&self) -> Duration {
        Duration::from_secs(self.gc_lifetime_secs.unwrap_or(DEFAULT_GC_LIFETIME_SECS))
    }

    /// Resolves storage credentials. A connection string wins over account name/key.
    pub fn credentials(&self) -> TableResult<StorageCredentials> {
        let mut creds = if let Some(connection_string) = &self.connection_string {
            StorageCredentials::from_connection_string(connection_string)?
        } else {
            match (&self.account_name, &self.account_key) {
                (Some(name), Some(key)) => StorageCredentials::new(name, key),
                _ => {
                    return Err(TableError::Config(
                        "Either connection_string or account_name and account_key must be set"
                            .to_string(),
                    ))
                }
            }
        };

        if let Some(endpoint) = &self.table_endpoint {
            creds = creds.with_table_endpoint(endpoint);
        }
        Ok(creds)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> TableResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        TableError::Config("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> TableResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
