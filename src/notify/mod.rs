//! Outgoing mail: confirmation links and price-change alerts
//!
//! `MailSender` is the single transport seam; `SmtpMailer` implements it over
//! SMTP. `Notifier` batches price-change alerts for a set of subscribers and
//! is implemented on top of any `MailSender` by `MailNotifier`.

mod smtp;

pub use smtp::SmtpMailer;

use crate::storage::Subscription;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or delivering mail
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("{failed} of {total} notifications failed")]
    Partial { failed: usize, total: usize },
}

/// Delivers a single plain-text message
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Notifies subscribers that a listing's price changed
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one alert per subscriber. Delivery is attempted for every
    /// subscriber even when some fail.
    async fn notify_price_change(
        &self,
        subscribers: &[Subscription],
        new_price: i64,
    ) -> Result<(), MailError>;
}

/// Subject line of price-change alerts
pub const PRICE_CHANGE_SUBJECT: &str = "The price of your item has changed";

/// Builds the body of a price-change alert
pub fn price_change_body(subscription: &Subscription, new_price: i64) -> String {
    format!(
        "The price of your item has changed!\nOld price: {}\nNew price: {}\nSee here: {}\n",
        subscription.price, new_price, subscription.url
    )
}

/// Notifier sending one email per subscriber through a `MailSender`
pub struct MailNotifier {
    sender: Arc<dyn MailSender>,
}

impl MailNotifier {
    pub fn new(sender: Arc<dyn MailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify_price_change(
        &self,
        subscribers: &[Subscription],
        new_price: i64,
    ) -> Result<(), MailError> {
        let mut failed = 0;
        for sub in subscribers {
            let body = price_change_body(sub, new_price);
            if let Err(e) = self.sender.send(&sub.email, PRICE_CHANGE_SUBJECT, &body).await {
                tracing::warn!("Price alert to {} failed: {}", sub.email, e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(MailError::Partial {
                failed,
                total: subscribers.len(),
            });
        }
        Ok(())
    }
}
