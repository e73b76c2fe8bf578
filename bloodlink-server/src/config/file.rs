//! TOML file configuration structures.
//!
//! These structs directly map to the `bloodlink.toml` file format. Every
//! section is optional; an empty file yields a local development setup.

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:5000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000))
}

/// Donor notification section. Reloaded on SIGHUP.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Base URL of the web frontend; accept links in emails point here.
    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,
    #[serde(default)]
    pub email_delivery: bloodlink_core::config::EmailDelivery,
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            frontend_base_url: default_frontend_base_url(),
            email_delivery: Default::default(),
            fanout_concurrency: default_fanout_concurrency(),
        }
    }
}

fn default_frontend_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_fanout_concurrency() -> usize {
    bloodlink_core::config::FanoutConfig::DEFAULT_CONCURRENCY
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    Postgres,
    #[default]
    Memory,
    Disabled,
}

/// Event broker section.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub kind: BrokerKind,
    /// Additional connection attempts after the first one fails.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
    /// How often the Postgres broker polls for new messages.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Offsets are committed under this name, so a restart resumes where
    /// the last run stopped.
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            connect_retries: default_connect_retries(),
            connect_backoff_ms: default_connect_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            consumer_group: default_consumer_group(),
        }
    }
}

fn default_connect_retries() -> u32 {
    3
}

fn default_connect_backoff_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_consumer_group() -> String {
    bloodlink_core::processors::CONSUMER_GROUP.to_string()
}

/// Outgoing email section. SMTP credentials come from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Display name used in the `From` header and the `fromName` template var.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_name: default_from_name(),
        }
    }
}

fn default_from_name() -> String {
    "BloodLink".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodlink_core::config::EmailDelivery;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[notifications]
frontend_base_url = "https://bloodlink.example.org/app"
email_delivery = "queued"
fanout_concurrency = 4

[broker]
kind = "postgres"
connect_retries = 5
connect_backoff_ms = 1000
poll_interval_ms = 100
consumer_group = "bloodlink-pune"

[email]
from_name = "BloodLink Pune"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(
            config.notifications.frontend_base_url,
            "https://bloodlink.example.org/app"
        );
        assert_eq!(config.notifications.email_delivery, EmailDelivery::Queued);
        assert_eq!(config.notifications.fanout_concurrency, 4);
        assert_eq!(config.broker.kind, BrokerKind::Postgres);
        assert_eq!(config.broker.connect_retries, 5);
        assert_eq!(config.broker.consumer_group, "bloodlink-pune");
        assert_eq!(config.email.from_name, "BloodLink Pune");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 5000);
        assert_eq!(config.notifications.frontend_base_url, "http://localhost:3000");
        assert_eq!(config.notifications.email_delivery, EmailDelivery::Direct);
        assert_eq!(config.broker.kind, BrokerKind::Memory);
        assert_eq!(config.broker.connect_retries, 3);
        assert_eq!(config.broker.consumer_group, "bloodlink");
        assert_eq!(config.email.from_name, "BloodLink");
    }

    #[test]
    fn test_unknown_broker_kind_is_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("[broker]\nkind = \"kafka\"\n");
        assert!(result.is_err());
    }
}
