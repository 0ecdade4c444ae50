//! Configuration module for Price-Watch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use price_watch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Rescan workers: {}", config.tracker.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConfirmationConfig, ListingConfig, MailConfig, StorageConfig, TrackerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

// Re-export validation helpers shared with request validation
pub use validation::{
    is_valid_email, parse_tls_version, MAX_RESCAN_INTERVAL_MINUTES, MAX_VALIDITY_HOURS,
};
