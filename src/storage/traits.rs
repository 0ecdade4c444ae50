//! Storage traits and error types
//!
//! This module defines the trait interfaces the engine consumes and the
//! associated error types. Implementations must be safe for concurrent use;
//! they are shared behind `Arc` by admission requests and rescan workers.

use crate::storage::{ConfirmationRecord, PricePollTask, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Subscription persistence
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persists a new subscription
    async fn save(&self, subscription: &Subscription) -> StorageResult<()>;

    /// Overwrites the stored row matching `(email, url)`
    async fn update(&self, subscription: &Subscription) -> StorageResult<()>;

    /// Returns true if `email` is already subscribed to `url`
    async fn find_duplicate(&self, email: &str, url: &str) -> StorageResult<bool>;

    /// Returns true if any subscription of `email` is verified
    async fn is_verified(&self, email: &str) -> StorageResult<bool>;

    /// Streams every distinct `(url, price)` pair of verified subscriptions
    /// into `sink`, waiting whenever the sink is full
    ///
    /// Returns the number of pairs delivered. Stops early without error if
    /// the receiving side has been closed.
    async fn stream_url_price_pairs(
        &self,
        sink: mpsc::Sender<PricePollTask>,
    ) -> StorageResult<usize>;

    /// Returns the verified subscriptions of `url`
    async fn subscribers_of(&self, url: &str) -> StorageResult<Vec<Subscription>>;
}

/// Confirmation record persistence
#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    /// Stores a record. An existing record for the same email is replaced.
    async fn insert(&self, record: &ConfirmationRecord) -> StorageResult<()>;

    async fn find_by_hash(&self, hash: &str) -> StorageResult<Option<ConfirmationRecord>>;

    async fn update_hash_and_deadline(
        &self,
        email: &str,
        hash: &str,
        deadline: DateTime<Utc>,
    ) -> StorageResult<()>;

    async fn delete_by_hash(&self, hash: &str) -> StorageResult<()>;

    /// Flags every subscription of `email` as verified
    async fn mark_verified(&self, email: &str) -> StorageResult<()>;
}
