//! Configuration for fieldstore.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
        })
    }
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    url: SecretString,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        // Priority: env var > default file under the home directory
        let url = optional_env("DATABASE_URL")?
            .unwrap_or_else(|| default_database_path().to_string_lossy().into_owned());

        // Only SQLite is supported; reject URLs for other backends early.
        if let Some((scheme, _)) = url.split_once("://") {
            if scheme != "sqlite" && scheme != "file" {
                return Err(ConfigError::InvalidValue {
                    key: "DATABASE_URL".to_string(),
                    message: format!(
                        "unsupported scheme '{scheme}', expected sqlite:// or a file path"
                    ),
                });
            }
        }

        Ok(Self {
            url: SecretString::from(url),
        })
    }

    /// Build a config pointing at an explicit URL or path. Used by tests.
    pub fn for_test(url: &str) -> Self {
        Self {
            url: SecretString::from(url.to_string()),
        }
    }

    /// Get the database URL (exposes the secret).
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

/// Get the default database file path (~/.fieldstore/records.db).
fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fieldstore")
        .join("records.db")
}

fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}
