use crate::config::types::{
    Config, ConfirmationConfig, ListingConfig, MailConfig, StorageConfig, TrackerConfig,
};
use crate::ConfigError;
use reqwest::tls;
use url::Url;

/// Longest accepted pause between rescan passes (one week)
pub const MAX_RESCAN_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Longest accepted confirmation window (one year)
pub const MAX_VALIDITY_HOURS: u32 = 365 * 24;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_tracker_config(&config.tracker)?;
    validate_listing_config(&config.listing)?;
    validate_storage_config(&config.storage)?;
    validate_mail_config(&config.mail)?;
    validate_confirmation_config(&config.confirmation)?;
    Ok(())
}

/// Validates rescan and fetch settings
fn validate_tracker_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > 256 {
        return Err(ConfigError::Validation(format!(
            "worker-count must be between 1 and 256, got {}",
            config.worker_count
        )));
    }

    if config.rescan_interval < 1 || config.rescan_interval > MAX_RESCAN_INTERVAL_MINUTES {
        return Err(ConfigError::Validation(format!(
            "rescan-interval must be between 1 and {} minutes, got {}",
            MAX_RESCAN_INTERVAL_MINUTES, config.rescan_interval
        )));
    }

    if config.page_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "page-timeout must be >= 100ms, got {}ms",
            config.page_timeout
        )));
    }

    if config.task_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "task-timeout must be >= 100ms, got {}ms",
            config.task_timeout
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    parse_tls_version(&config.max_tls_version)?;

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    if config.price_prefix.is_empty() || config.price_terminator.is_empty() {
        return Err(ConfigError::Validation(
            "price-prefix and price-terminator cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates mail settings; the password must already be resolved
fn validate_mail_config(config: &MailConfig) -> Result<(), ConfigError> {
    if config.smtp_host.is_empty() {
        return Err(ConfigError::Validation(
            "smtp-host cannot be empty".to_string(),
        ));
    }

    if config.password.is_none() {
        return Err(ConfigError::Validation(
            "mail needs either password or password-env".to_string(),
        ));
    }

    if !is_valid_email(&config.from) {
        return Err(ConfigError::Validation(format!(
            "Invalid sender address: '{}'",
            config.from
        )));
    }

    Ok(())
}

fn validate_confirmation_config(config: &ConfirmationConfig) -> Result<(), ConfigError> {
    Url::parse(&config.link_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid link-base: {}", e)))?;

    if config.validity_hours < 1 || config.validity_hours > MAX_VALIDITY_HOURS {
        return Err(ConfigError::Validation(format!(
            "validity-hours must be between 1 and {}, got {}",
            MAX_VALIDITY_HOURS, config.validity_hours
        )));
    }

    if config.secret.is_empty() {
        return Err(ConfigError::Validation(
            "confirmation secret cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Maps a configured TLS version string to the client's version type
pub fn parse_tls_version(version: &str) -> Result<tls::Version, ConfigError> {
    match version {
        "1.2" => Ok(tls::Version::TLS_1_2),
        "1.3" => Ok(tls::Version::TLS_1_3),
        other => Err(ConfigError::Validation(format!(
            "max-tls-version must be \"1.2\" or \"1.3\", got '{}'",
            other
        ))),
    }
}

/// Basic email format check: one `@`, text on both sides, a dot in the domain
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    // Domain part should contain at least one dot, not at either end
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
