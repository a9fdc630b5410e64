use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;
use crate::api::DigestTransport;
use crate::config::EmailConfig;
use crate::models::Digest;

/// Digest delivery errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Email configuration missing. Set EMAIL_SENDER, EMAIL_PASSWORD and EMAIL_RECIPIENT")]
    NotConfigured,
    #[error("Invalid address '{0}': {1}")]
    InvalidAddress(String, String),
    #[error("Failed to build message: {0}")]
    Message(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Sends digests through a STARTTLS SMTP relay
pub struct SmtpMailer {
    config: Option<EmailConfig>,
}

impl SmtpMailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress(address.to_string(), e.to_string()))
}

/// Build a `multipart/alternative` message carrying both digest bodies
pub fn build_message(config: &EmailConfig, digest: &Digest) -> Result<Message, TransportError> {
    Message::builder()
        .from(parse_mailbox(&config.sender)?)
        .to(parse_mailbox(&config.recipient)?)
        .subject(digest.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            digest.text_body.clone(),
            digest.html_body.clone(),
        ))
        .map_err(|e| TransportError::Message(e.to_string()))
}

impl DigestTransport for SmtpMailer {
    async fn send_digest(&self, digest: &Digest) -> Result<(), TransportError> {
        let config = self.config.as_ref().ok_or(TransportError::NotConfigured)?;
        let message = build_message(config, digest)?;

        info!("Connecting to {}:{}...", config.smtp_server, config.smtp_port);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| TransportError::Smtp(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.sender.clone(), config.password.clone()))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        info!("✅ Email sent successfully to {}", config.recipient);
        Ok(())
    }
}
