//! SMTP email delivery implementation
//!
//! This module implements the core `Mailer` trait over lettre's async SMTP
//! transport, delivering raw security tokens to account owners. Recipient
//! addresses are masked in log output.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use ag_core::services::lifecycle::Mailer;

use super::mask_email;
use crate::InfrastructureError;

/// SMTP transport configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay hostname (e.g., smtp.example.com)
    pub host: String,
    /// SMTP relay port (typically 587 for STARTTLS)
    pub port: u16,
    /// Username for SMTP authentication
    pub username: String,
    /// Password or app-specific password
    pub password: String,
    /// Sender address placed in the From header
    pub from_address: String,
    /// Display name placed in the From header
    pub from_name: String,
}

impl SmtpConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, InfrastructureError> {
        dotenvy::dotenv().ok();

        let host = std::env::var("SMTP_HOST")
            .map_err(|_| InfrastructureError::Config("SMTP_HOST not set".to_string()))?;
        let username = std::env::var("SMTP_USERNAME")
            .map_err(|_| InfrastructureError::Config("SMTP_USERNAME not set".to_string()))?;
        let password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| InfrastructureError::Config("SMTP_PASSWORD not set".to_string()))?;
        let from_address = std::env::var("SMTP_FROM_ADDRESS")
            .map_err(|_| InfrastructureError::Config("SMTP_FROM_ADDRESS not set".to_string()))?;

        Ok(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            username,
            password,
            from_address,
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| "AccountGuard".to_string()),
        })
    }
}

/// SMTP mailer implementation
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create a new SMTP mailer
    pub fn new(config: SmtpConfig) -> Result<Self, InfrastructureError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| InfrastructureError::Email(format!("Invalid SMTP relay: {e}")))?
            .port(config.port)
            .credentials(credentials)
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| InfrastructureError::Config(format!("Invalid from address: {e}")))?;

        info!(relay = %config.host, port = config.port, "SMTP mailer initialized");

        Ok(Self { transport, from })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, InfrastructureError> {
        Self::new(SmtpConfig::from_env()?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_token_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, String> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| format!("Invalid recipient address: {e}"))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| format!("Failed to build message: {e}"))?;

        match self.transport.send(message).await {
            Ok(response) => {
                info!(
                    recipient = %mask_email(to),
                    event = "token_email_sent",
                    "Delivered security token email"
                );
                Ok(response.code().to_string())
            }
            Err(e) => {
                error!(
                    recipient = %mask_email(to),
                    error = %e,
                    event = "token_email_failed",
                    "Failed to deliver security token email"
                );
                Err(format!("SMTP send failed: {e}"))
            }
        }
    }
}
