use super::{EmailError, EmailMessage, EmailSender, render};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "no-reply@bloodlink.local";

/// SMTP relay settings, read from the environment.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    /// `None` when `SMTP_HOST` is unset.
    ///
    /// Also reads `SMTP_PORT` (default 587), `SMTP_FROM`, `SMTP_USER` and
    /// `SMTP_PASSWORD`.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let host = lookup("SMTP_HOST")?;
        Some(Self {
            host,
            port: lookup("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: lookup("SMTP_FROM").unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_owned()),
            user: lookup("SMTP_USER"),
            password: lookup("SMTP_PASSWORD"),
        })
    }
}

/// Sends rendered templates through an SMTP relay using STARTTLS.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    from_name: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig, from_name: impl Into<String>) -> Result<Self, EmailError> {
        let from_name = from_name.into();
        let from = Mailbox::new(
            Some(from_name.clone()),
            config.from_address.parse::<Address>()?,
        );

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            from_name,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let rendered = render(message, &self.from_name);
        let email = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, message.to.parse::<Address>()?))
            .subject(rendered.subject)
            .multipart(MultiPart::alternative_plain_html(rendered.text, rendered.html))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(email).await?;
        info!(to = %message.to, template = ?message.template, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_requires_host() {
        assert!(SmtpConfig::from_lookup(|_| None).is_none());
    }

    #[test]
    fn test_config_defaults() {
        let env = HashMap::from([("SMTP_HOST", "smtp.example.com"), ("SMTP_PORT", "oops")]);
        let config = SmtpConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert_eq!(config.from_address, DEFAULT_FROM_ADDRESS);
        assert!(config.user.is_none());
    }
}
