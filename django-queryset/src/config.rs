//! Client configuration.
//!
//! Settings are read with the `config` crate from an optional file
//! (`django-client.toml` in the working directory unless a path is
//! given), overridden by `DJANGO_CLIENT_*` environment variables, e.g.
//! `DJANGO_CLIENT_BASE_URL` and `DJANGO_CLIENT_TIMEOUT_SECS`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Settings for a [`ServerClient`](crate::ServerClient).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL that model endpoints are relative to.
    #[serde(default)]
    pub base_url: String,

    /// Request deadline in seconds. Without one, a request that never
    /// completes waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Headers sent with every request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from a file (if present) and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, None)
    }

    /// Like [`load`](Self::load), but reading `DJANGO_CLIENT_*` variables
    /// from `env` instead of the process environment when it is given.
    pub fn load_with_env(
        config_path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        } else {
            builder = builder.add_source(File::with_name("django-client").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("DJANGO_CLIENT")
                .try_parsing(true)
                .source(env),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation("base_url is required".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
