//! Pool configuration loading
//!
//! Credentials are supplied either programmatically or from a TOML file:
//!
//! ```toml
//! [[credentials]]
//! username = "rider@example.com"
//! password = "..."
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::secret::Secret;

/// One username/password pair. Immutable once constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

/// Root configuration for a connection pool.
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub credentials: Vec<Credentials>,
}

impl PoolConfig {
    /// Load configuration from a TOML file.
    ///
    /// Validates that at least one credential pair is present and that no
    /// username is empty; a pool built from this config must never be empty.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PoolConfig = toml::from_str(&contents)?;

        if config.credentials.is_empty() {
            return Err(Error::Config("no credentials provided".into()));
        }
        for (i, creds) in config.credentials.iter().enumerate() {
            if creds.username.is_empty() {
                return Err(Error::Config(format!("credentials[{i}]: empty username")));
            }
        }

        Ok(config)
    }
}
