//! Outbound email.
//!
//! Workflows build an [`EmailMessage`] naming a template and its variables
//! and hand it to an [`EmailSender`]. Rendering happens in the sender, so a
//! queued message carries only data.

mod smtp;
mod templates;

pub use smtp::{SmtpConfig, SmtpEmailSender};
pub use templates::{RenderedEmail, render};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    BloodRequest,
    OtpVerification,
}

/// A templated email. This is also the payload of the email topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub template: EmailTemplate,
    #[serde(default)]
    pub template_vars: BTreeMap<String, String>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, template: EmailTemplate) -> Self {
        Self {
            to: to.into(),
            template,
            template_vars: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.template_vars.insert(key.to_owned(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("email build error: {0}")]
    Build(String),
}

/// Delivers a message or reports why it could not.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Renders messages and writes them to the log instead of sending.
///
/// Used when no SMTP relay is configured.
pub struct LogEmailSender {
    from_name: String,
}

impl LogEmailSender {
    pub fn new(from_name: impl Into<String>) -> Self {
        Self {
            from_name: from_name.into(),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        message
            .to
            .parse::<lettre::Address>()
            .map_err(EmailError::Address)?;
        let rendered = render(message, &self.from_name);
        info!(
            to = %message.to,
            template = ?message.template,
            subject = %rendered.subject,
            "Email not sent (no SMTP relay configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records sent messages; fails for chosen recipients.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        sent: Mutex<Vec<EmailMessage>>,
        failing: Mutex<HashSet<String>>,
    }

    impl RecordingEmailSender {
        pub fn fail_for(&self, to: &str) {
            self.failing.lock().unwrap().insert(to.to_owned());
        }

        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            if self.failing.lock().unwrap().contains(&message.to) {
                return Err(EmailError::Build(format!("refusing {}", message.to)));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}
