//! Configuration module for bloodlink-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{BrokerKind, FileConfig};
use bloodlink_core::config::{FanoutConfig, RetryPolicy};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Broker settings after unit conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub kind: BrokerKind,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    pub consumer_group: String,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub fanout: FanoutConfig,
    pub broker: BrokerSettings,
    pub email_from_name: String,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides and validate.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        build_loaded_config(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    ///
    /// Only the `[notifications]` part is applied to the running server.
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let notifications = file_config.notifications;
    let frontend_base_url = Url::parse(&notifications.frontend_base_url).map_err(|e| {
        ConfigError::ValidationError(format!(
            "notifications.frontend_base_url {:?} is not a valid URL: {e}",
            notifications.frontend_base_url
        ))
    })?;
    if !matches!(frontend_base_url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(
            "notifications.frontend_base_url must be an http or https URL".into(),
        ));
    }
    if notifications.fanout_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "notifications.fanout_concurrency must be at least 1".into(),
        ));
    }
    if file_config.email.from_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "email.from_name must not be empty".into(),
        ));
    }

    if file_config.broker.consumer_group.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "broker.consumer_group must not be empty".into(),
        ));
    }

    let broker = file_config.broker;
    Ok(LoadedConfig {
        listen: file_config.server.listen,
        fanout: FanoutConfig {
            frontend_base_url,
            email_delivery: notifications.email_delivery,
            concurrency: notifications.fanout_concurrency,
        },
        broker: BrokerSettings {
            kind: broker.kind,
            retry: RetryPolicy {
                retries: broker.connect_retries,
                backoff: Duration::from_millis(broker.connect_backoff_ms),
            },
            poll_interval: Duration::from_millis(broker.poll_interval_ms),
            consumer_group: broker.consumer_group,
        },
        email_from_name: file_config.email.from_name,
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
