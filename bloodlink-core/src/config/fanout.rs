use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// How donor emails leave the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailDelivery {
    /// Send inline while fanning out.
    #[default]
    Direct,
    /// Publish to the email topic and let the consumer send.
    Queued,
}

/// Reloadable settings for notification fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Base of the accept link embedded in donor emails.
    pub frontend_base_url: Url,
    pub email_delivery: EmailDelivery,
    /// Upper bound on donors processed at once. Zero is treated as one.
    pub concurrency: usize,
}

impl FanoutConfig {
    pub const DEFAULT_CONCURRENCY: usize = 8;

    pub fn new(frontend_base_url: Url) -> Self {
        Self {
            frontend_base_url,
            email_delivery: EmailDelivery::Direct,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }
}

/// Fixed-backoff retry used when connecting to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}
