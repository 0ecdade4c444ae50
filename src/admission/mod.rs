//! Subscription admission
//!
//! Admitting a subscription needs three independent answers: the listing's
//! current price, whether the email already subscribes to the listing, and
//! whether the email is verified. They are requested concurrently as tasks
//! scoped to the request and joined in a fixed order (fetch, duplicate,
//! authorization) so the reported error is deterministic. Leaving early
//! cancels the outstanding lookups and waits for them to finish.

use crate::confirmation::{ConfirmationEngine, ConfirmationError};
use crate::storage::{StorageError, StorageResult, Subscription, SubscriptionStore};
use crate::tracker::PriceFetcher;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

/// Why a subscription request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Invalid listing URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Listing {0} could not be priced")]
    UnreachableListing(String),

    #[error("Already subscribed to this listing")]
    AlreadySubscribed,
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Confirmation error: {0}")]
    Confirmation(#[from] ConfirmationError),

    #[error("Admission task failed: {0}")]
    Task(#[from] JoinError),
}

impl AdmissionError {
    /// Returns true if the request itself was at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

/// A spawned task that cannot outlive its owner
///
/// Dropping it aborts the task; `cancel` aborts and then waits until the
/// task has actually stopped.
struct ScopedTask<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> ScopedTask<T> {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    async fn join(mut self) -> Result<T, JoinError> {
        (&mut self.handle).await
    }

    async fn cancel(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl<T: Send + 'static> ScopedTask<StorageResult<T>> {
    /// Joins a store lookup, folding task and store failures together
    async fn output(self) -> Result<T, AdmissionError> {
        Ok(self.join().await??)
    }
}

impl<T> Drop for ScopedTask<T> {
    fn drop(&mut self) {
        // No-op when the task already finished
        self.handle.abort();
    }
}

/// Orchestrates one subscribe request
pub struct AdmissionPipeline {
    fetcher: Arc<dyn PriceFetcher>,
    subscriptions: Arc<dyn SubscriptionStore>,
    confirmations: Arc<ConfirmationEngine>,
}

impl AdmissionPipeline {
    pub fn new(
        fetcher: Arc<dyn PriceFetcher>,
        subscriptions: Arc<dyn SubscriptionStore>,
        confirmations: Arc<ConfirmationEngine>,
    ) -> Self {
        Self {
            fetcher,
            subscriptions,
            confirmations,
        }
    }

    /// Admits `email` as a subscriber of the listing at `url`
    ///
    /// Inputs are expected to be syntactically valid already. On success the
    /// stored subscription is returned; an unverified email additionally
    /// receives a confirmation link. A failure to issue that link is reported
    /// but the subscription stays stored.
    pub async fn admit(&self, email: &str, url: &str) -> Result<Subscription, AdmissionError> {
        let fetch = {
            let fetcher = self.fetcher.clone();
            let url = url.to_string();
            ScopedTask::spawn(async move { fetcher.fetch(&url).await })
        };
        let authorization = {
            let store = self.subscriptions.clone();
            let email = email.to_string();
            ScopedTask::spawn(async move { store.is_verified(&email).await })
        };
        let duplicate = {
            let store = self.subscriptions.clone();
            let email = email.to_string();
            let url = url.to_string();
            ScopedTask::spawn(async move { store.find_duplicate(&email, &url).await })
        };

        let price = match fetch.join().await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                tracing::info!("Rejecting {} for {}: {}", url, email, e);
                duplicate.cancel().await;
                authorization.cancel().await;
                return Err(Rejection::UnreachableListing(url.to_string()).into());
            }
            Err(e) => {
                duplicate.cancel().await;
                authorization.cancel().await;
                return Err(e.into());
            }
        };

        let already_subscribed = match duplicate.output().await {
            Ok(found) => found,
            Err(e) => {
                authorization.cancel().await;
                return Err(e);
            }
        };
        if already_subscribed {
            authorization.cancel().await;
            return Err(Rejection::AlreadySubscribed.into());
        }

        let verified = authorization.output().await?;

        let subscription = Subscription::new(email, url, price, verified);
        self.subscriptions.save(&subscription).await?;
        tracing::info!(
            "Admitted {} for {} at price {} (verified: {})",
            email,
            url,
            price,
            verified
        );

        if !verified {
            if let Err(e) = self.confirmations.issue(email).await {
                tracing::error!("Confirmation for {} could not be issued: {}", email, e);
                return Err(e.into());
            }
        }

        Ok(subscription)
    }
}
