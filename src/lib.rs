//! Price-Watch: listing price tracker with email alerts
//!
//! This crate implements a price-monitoring engine: it admits subscriptions to
//! externally hosted listings, confirms subscriber emails, periodically
//! re-polls every tracked listing and notifies subscribers when a price moves.

pub mod admission;
pub mod config;
pub mod confirmation;
pub mod notify;
pub mod service;
pub mod storage;
pub mod tracker;
pub mod validation;

use thiserror::Error;

/// Main error type for Price-Watch operations
#[derive(Debug, Error)]
pub enum PriceWatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] tracker::FetchError),

    #[error("Mail error: {0}")]
    Mail(#[from] notify::MailError),

    #[error("Admission error: {0}")]
    Admission(#[from] admission::AdmissionError),

    #[error("Confirmation error: {0}")]
    Confirmation(#[from] confirmation::ConfirmationError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing environment variable {0}")]
    MissingEnv(String),
}

/// Result type alias for Price-Watch operations
pub type Result<T> = std::result::Result<T, PriceWatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use admission::{AdmissionError, AdmissionPipeline, Rejection};
pub use config::Config;
pub use confirmation::{ConfirmOutcome, ConfirmationEngine, ConfirmationError};
pub use service::PriceWatch;
pub use storage::{ConfirmationRecord, PricePollTask, Subscription};
pub use tracker::{extract_price, FetchError, FetchOutcome, Fetcher, PriceFetcher};
