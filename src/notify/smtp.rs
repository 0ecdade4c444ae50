//! SMTP mail transport
//!
//! Credentials and the sender address come from the injected `MailConfig`.

use crate::config::MailConfig;
use crate::notify::{MailError, MailSender};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a STARTTLS transport for the configured relay
    ///
    /// No connection is opened until the first message is sent.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let password = config.password.clone().unwrap_or_default();
        let creds = Credentials::new(config.username.clone(), password);

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = parse_mailbox(&config.from)?;

        Ok(Self { mailer, from })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.mailer
            .send(msg)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!("Mail '{}' delivered to {}", subject, to);
        Ok(())
    }
}
