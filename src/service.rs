//! The price-watch service
//!
//! Wires validation, admission, confirmation and the rescan scheduler around
//! one store and one mail transport. This is the surface the CLI drives.

use crate::admission::{AdmissionError, AdmissionPipeline};
use crate::config::Config;
use crate::confirmation::{
    ConfirmOutcome, ConfirmationEngine, ConfirmationError, ConfirmationSettings,
    ConfirmationState,
};
use crate::notify::{MailNotifier, MailSender, SmtpMailer};
use crate::storage::{ConfirmationRecord, SqliteStorage, Subscription, SubscriptionStore};
use crate::tracker::{Fetcher, PassStats, PriceFetcher, PriceMarkers, RescanScheduler, RescanSettings};
use crate::validation::{DefaultValidator, Validator};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct PriceWatch {
    validator: Arc<dyn Validator>,
    storage: Arc<SqliteStorage>,
    confirmations: Arc<ConfirmationEngine>,
    admission: AdmissionPipeline,
    rescan: RescanScheduler,
}

impl PriceWatch {
    /// Builds the service from configuration, delivering mail over SMTP
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let mailer = Arc::new(SmtpMailer::new(&config.mail)?);
        Self::new(config, mailer)
    }

    /// Builds the service from configuration with the given mail transport
    pub fn new(config: &Config, mailer: Arc<dyn MailSender>) -> crate::Result<Self> {
        let storage = Arc::new(SqliteStorage::new(Path::new(&config.storage.database_path))?);
        let fetcher = Arc::new(Fetcher::from_config(
            &config.tracker,
            PriceMarkers::from(&config.listing),
        )?);

        Ok(Self::from_parts(
            storage,
            fetcher,
            mailer,
            ConfirmationSettings::from(&config.confirmation),
            RescanSettings::from(&config.tracker),
        ))
    }

    /// Assembles the service from already constructed components
    pub fn from_parts(
        storage: Arc<SqliteStorage>,
        fetcher: Arc<dyn PriceFetcher>,
        mailer: Arc<dyn MailSender>,
        confirmation: ConfirmationSettings,
        rescan: RescanSettings,
    ) -> Self {
        let confirmations = Arc::new(ConfirmationEngine::new(
            storage.clone(),
            mailer.clone(),
            confirmation,
        ));
        let admission =
            AdmissionPipeline::new(fetcher.clone(), storage.clone(), confirmations.clone());
        let rescan = RescanScheduler::new(
            storage.clone(),
            fetcher,
            Arc::new(MailNotifier::new(mailer)),
            rescan,
        );

        Self {
            validator: Arc::new(DefaultValidator),
            storage,
            confirmations,
            admission,
            rescan,
        }
    }

    /// Replaces the request validator
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn storage(&self) -> &Arc<SqliteStorage> {
        &self.storage
    }

    /// Validates and admits a subscription request
    pub async fn admit(&self, email: &str, url: &str) -> Result<Subscription, AdmissionError> {
        self.validator.validate_email(email)?;
        self.validator.validate_url(url)?;
        self.admission.admit(email, url).await
    }

    /// Resolves a confirmation link
    pub async fn confirm_by_hash(&self, hash: &str) -> Result<ConfirmOutcome, ConfirmationError> {
        self.confirmations.confirm(hash).await
    }

    /// Mails a fresh confirmation link to a subscribed but unverified email
    ///
    /// This is the recovery path when the first confirmation mail could not
    /// be delivered.
    pub async fn resend_confirmation(
        &self,
        email: &str,
    ) -> Result<ConfirmationRecord, ConfirmationError> {
        let verified = self.storage.is_verified(email).await?;
        let record = self.storage.confirmation_for(email)?;
        let state = ConfirmationState::of(record.as_ref(), verified, Utc::now());

        if state.is_terminal() {
            return Err(ConfirmationError::AlreadyVerified(email.to_string()));
        }
        if state == ConfirmationState::NoRecord
            && self.storage.subscriptions_of_email(email)?.is_empty()
        {
            return Err(ConfirmationError::NotFound);
        }

        tracing::debug!("Resending confirmation to {} ({})", email, state);
        self.confirmations.issue(email).await
    }

    /// Spawns the recurring rescan loop
    pub fn start_rescan_loop(&self) -> JoinHandle<()> {
        let scheduler = self.rescan.clone();
        tokio::spawn(async move { scheduler.run_forever().await })
    }

    /// Runs exactly one rescan pass
    pub async fn run_single_pass(&self) -> PassStats {
        self.rescan.run_pass().await
    }
}
