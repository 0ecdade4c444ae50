//! Email confirmation engine
//!
//! Gates which subscribers receive price alerts. A new unverified subscriber
//! is sent a link carrying an opaque hash; following the link before its
//! deadline verifies every subscription of that email. Following it after the
//! deadline issues a fresh hash and resends the link instead.

mod state;
mod token;

pub use state::ConfirmationState;
pub use token::generate_hash;

use crate::config::{ConfirmationConfig, MAX_VALIDITY_HOURS};
use crate::notify::{MailError, MailSender};
use crate::storage::{ConfirmationRecord, ConfirmationStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Subject line of confirmation mails
pub const CONFIRMATION_SUBJECT: &str = "Confirm your price-watch subscription";

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Confirmation hash not found")]
    NotFound,

    #[error("Email {0} is already confirmed")]
    AlreadyVerified(String),

    #[error("Confirmation deadline out of range: {0} past {1}")]
    DeadlineOutOfRange(Duration, DateTime<Utc>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

impl ConfirmationError {
    /// Returns true if the caller supplied something unusable
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound | Self::AlreadyVerified(_))
    }
}

/// Result of following a confirmation link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The email is now verified
    Confirmed { email: String },
    /// The link had expired; a fresh one was mailed
    Reissued { email: String },
}

/// Link and hash parameters
#[derive(Debug, Clone)]
pub struct ConfirmationSettings {
    pub link_base: String,
    pub validity: Duration,
    pub secret: String,
}

impl From<&ConfirmationConfig> for ConfirmationSettings {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            link_base: config.link_base.clone(),
            validity: Duration::hours(i64::from(config.validity_hours.min(MAX_VALIDITY_HOURS))),
            secret: config.secret.clone(),
        }
    }
}

pub struct ConfirmationEngine {
    store: Arc<dyn ConfirmationStore>,
    mailer: Arc<dyn MailSender>,
    settings: ConfirmationSettings,
    nonce: AtomicU64,
}

impl ConfirmationEngine {
    pub fn new(
        store: Arc<dyn ConfirmationStore>,
        mailer: Arc<dyn MailSender>,
        settings: ConfirmationSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            settings,
            nonce: AtomicU64::new(0),
        }
    }

    /// Builds the link mailed to the subscriber
    pub fn confirmation_link(&self, hash: &str) -> String {
        let separator = if self.settings.link_base.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}hash={}", self.settings.link_base, separator, hash)
    }

    /// Issues a fresh hash for `email`, stores it and mails the link
    ///
    /// Any previous record of the email is replaced, so only the newest link
    /// works. If the mail cannot be sent the stored record is kept and the
    /// error is returned.
    pub async fn issue(&self, email: &str) -> Result<ConfirmationRecord, ConfirmationError> {
        let now = Utc::now();
        let record = ConfirmationRecord {
            email: email.to_string(),
            hash: self.next_hash(email, now),
            deadline: self.deadline_after(now)?,
        };

        self.store.insert(&record).await?;
        self.send_link(&record).await?;

        tracing::info!("Confirmation issued for {}", email);
        Ok(record)
    }

    /// Resolves a confirmation hash
    ///
    /// * unknown hash: `NotFound`, nothing changes
    /// * live hash: subscriptions verified, record deleted, `Confirmed`
    /// * expired hash: new hash and deadline stored in place, link resent,
    ///   `Reissued`; nothing is verified
    pub async fn confirm(&self, hash: &str) -> Result<ConfirmOutcome, ConfirmationError> {
        if hash.is_empty() {
            return Err(ConfirmationError::NotFound);
        }

        let record = self
            .store
            .find_by_hash(hash)
            .await?
            .ok_or(ConfirmationError::NotFound)?;

        let now = Utc::now();
        let state = ConfirmationState::of(Some(&record), false, now);

        if state.needs_reissue() {
            let refreshed = ConfirmationRecord {
                hash: self.next_hash(&record.email, now),
                deadline: self.deadline_after(now)?,
                ..record
            };
            self.store
                .update_hash_and_deadline(&refreshed.email, &refreshed.hash, refreshed.deadline)
                .await?;
            self.send_link(&refreshed).await?;

            tracing::info!("Expired confirmation for {} reissued", refreshed.email);
            return Ok(ConfirmOutcome::Reissued {
                email: refreshed.email,
            });
        }

        self.store.mark_verified(&record.email).await?;
        self.store.delete_by_hash(hash).await?;

        tracing::info!("Email {} confirmed", record.email);
        Ok(ConfirmOutcome::Confirmed {
            email: record.email,
        })
    }

    fn deadline_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfirmationError> {
        now.checked_add_signed(self.settings.validity)
            .ok_or(ConfirmationError::DeadlineOutOfRange(self.settings.validity, now))
    }

    fn next_hash(&self, email: &str, now: DateTime<Utc>) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        generate_hash(&self.settings.secret, email, now, nonce)
    }

    async fn send_link(&self, record: &ConfirmationRecord) -> Result<(), MailError> {
        let body = format!(
            "Please confirm your email to start receiving price alerts:\n{}\n\nThe link is valid until {}.\n",
            self.confirmation_link(&record.hash),
            record.deadline.format("%Y-%m-%d %H:%M UTC")
        );
        self.mailer
            .send(&record.email, CONFIRMATION_SUBJECT, &body)
            .await
    }
}
