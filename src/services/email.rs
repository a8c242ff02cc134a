//! Transactional email
//!
//! `Mailer` is the seam between the shop and its mail transport. SMTP is
//! used when a host is configured; otherwise mail is written to the log so a
//! development setup still shows reset links.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

/// A rendered outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Sends mail through an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid from address '{}': {}", config.from, e))?;

        // 465 speaks implicit TLS, everything else upgrades with STARTTLS
        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address '{}': {}", email.to, e))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Writes mail to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email not sent:\n{}",
            email.html
        );
        Ok(())
    }
}

/// Pick the transport for the configuration
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.smtp_host.as_deref().filter(|h| !h.is_empty()) {
        Some(host) => {
            tracing::info!("Sending mail via SMTP relay {}:{}", host, config.smtp_port);
            Ok(Arc::new(SmtpMailer::new(config, host)?))
        }
        None => {
            tracing::info!("No SMTP host configured, outgoing mail will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Send an email, logging failures instead of returning them
pub async fn send_logged(mailer: &dyn Mailer, email: Email) {
    if let Err(e) = mailer.send(&email).await {
        tracing::warn!(to = %email.to, subject = %email.subject, "Failed to send email: {:#}", e);
    }
}

pub fn signup_email(to: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Signup succeeded!".to_string(),
        html: "<h1>You successfully signed up!</h1>".to_string(),
    }
}

pub fn reset_email(to: &str, base_url: &str, token: &str) -> Email {
    let link = format!("{}/reset/{}", base_url.trim_end_matches('/'), token);
    Email {
        to: to.to_string(),
        subject: "Password reset".to_string(),
        html: format!(
            "<p>You requested a password reset</p>\
             <p>Click this <a href=\"{}\">link</a> to set a new password.</p>",
            link
        ),
    }
}

/// Keeps every email in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<Email>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("mailer lock poisoned"))?
            .push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &Email) -> Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn test_reset_email_contains_link() {
        let email = reset_email("a@b.com", "http://localhost:3000/", "abc123");
        assert_eq!(email.subject, "Password reset");
        assert!(email.html.contains("href=\"http://localhost:3000/reset/abc123\""));
    }

    #[test]
    fn test_signup_email() {
        let email = signup_email("a@b.com");
        assert_eq!(email.to, "a@b.com");
        assert_eq!(email.subject, "Signup succeeded!");
    }

    #[tokio::test]
    async fn test_send_logged_swallows_errors() {
        send_logged(&FailingMailer, signup_email("a@b.com")).await;
    }

    #[tokio::test]
    async fn test_recording_mailer_records() {
        let mailer = RecordingMailer::default();
        send_logged(&mailer, signup_email("a@b.com")).await;
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_mailer_from_config_without_host_logs() {
        let config = MailConfig::default();
        assert!(mailer_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_mailer_from_config_with_host() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_username: Some("user".to_string()),
            smtp_password: Some("pass".to_string()),
            ..MailConfig::default()
        };
        assert!(mailer_from_config(&config).is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let config = MailConfig {
            from: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(SmtpMailer::new(&config, "smtp.example.com").is_err());
    }
}
