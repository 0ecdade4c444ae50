//! Storage module for subscriptions and confirmation records
//!
//! This module handles all persistence for the tracker, including:
//! - The store traits consumed by admission, confirmation and rescan
//! - SQLite database initialization and schema management
//! - The record types flowing through those traits

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteStorage, StorageStats};
pub use traits::{ConfirmationStore, StorageError, StorageResult, SubscriptionStore};

use chrono::{DateTime, Utc};

/// A subscriber's interest in one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub email: String,
    pub url: String,
    /// Price observed at the last successful poll
    pub price: i64,
    /// Whether the owning email has completed confirmation
    pub verified: bool,
}

impl Subscription {
    pub fn new(email: impl Into<String>, url: impl Into<String>, price: i64, verified: bool) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            price,
            verified,
        }
    }

    /// Returns a copy of this subscription carrying a new price
    pub fn with_price(&self, price: i64) -> Self {
        Self {
            price,
            ..self.clone()
        }
    }
}

/// A pending email confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRecord {
    pub email: String,
    pub hash: String,
    pub deadline: DateTime<Utc>,
}

/// One listing to re-poll during a rescan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePollTask {
    pub url: String,
    pub last_known_price: i64,
}
