//! Syntactic validation of subscription requests
//!
//! Runs before admission so that obviously malformed input never reaches the
//! network or the stores.

use crate::admission::Rejection;
use crate::config::is_valid_email;
use url::Url;

pub trait Validator: Send + Sync {
    fn validate_url(&self, url: &str) -> Result<(), Rejection>;

    fn validate_email(&self, email: &str) -> Result<(), Rejection>;
}

/// Accepts absolute `http`/`https` URLs with a host and `local@domain.tld`
/// style addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate_url(&self, url: &str) -> Result<(), Rejection> {
        let parsed = Url::parse(url).map_err(|_| Rejection::InvalidUrl(url.to_string()))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Rejection::InvalidUrl(url.to_string()));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(Rejection::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    fn validate_email(&self, email: &str) -> Result<(), Rejection> {
        if is_valid_email(email) {
            Ok(())
        } else {
            Err(Rejection::InvalidEmail(email.to_string()))
        }
    }
}
