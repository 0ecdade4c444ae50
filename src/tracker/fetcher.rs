//! HTTP fetcher implementation
//!
//! This module handles all listing requests, including:
//! - Building the shared HTTP client with a capped TLS version and page timeout
//! - GET requests for listing pages
//! - Turning the page into a price via the extractor
//! - Error classification
//!
//! There are no retries here. The rescan loop retries on its next pass and
//! admission reports the failure to the subscriber.

use crate::config::{parse_tls_version, TrackerConfig};
use crate::tracker::extractor::{extract_price, PriceMarkers};
use crate::PriceWatchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

/// Why a listing could not be priced
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Listing {url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("No price marker found on {url}")]
    PriceNotFound { url: String },

    #[error("Malformed price '{raw}' on {url}: {source}")]
    MalformedPrice {
        url: String,
        raw: String,
        source: ParseIntError,
    },

    #[error("Invalid price {price} on {url}")]
    InvalidPrice { url: String, price: i64 },
}

impl FetchError {
    /// The listing URL the failure refers to
    pub fn url(&self) -> &str {
        match self {
            Self::Request { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Body { url, .. }
            | Self::PriceNotFound { url }
            | Self::MalformedPrice { url, .. }
            | Self::InvalidPrice { url, .. } => url,
        }
    }
}

/// Result of one fetch-and-extract attempt
pub type FetchOutcome = Result<i64, FetchError>;

/// Anything that can price a listing URL
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Builds the shared HTTP client
///
/// # Arguments
///
/// * `config` - Tracker configuration supplying the page timeout and TLS cap
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(PriceWatchError)` - Invalid TLS version or client construction failure
pub fn build_http_client(config: &TrackerConfig) -> Result<Client, PriceWatchError> {
    let max_tls = parse_tls_version(&config.max_tls_version)?;

    let client = Client::builder()
        .user_agent(concat!("price-watch/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_millis(config.page_timeout))
        .max_tls_version(max_tls)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Parses extracted price text into an integer
pub fn parse_price(raw: &str) -> Result<i64, ParseIntError> {
    raw.trim().parse::<i64>()
}

/// Fetches a listing page and extracts its price
///
/// # Flow
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | Transport timeout | `Timeout` |
/// | Other transport failure | `Request` |
/// | Status other than 200 | `Status` |
/// | Body read failure | `Body` |
/// | Markers absent | `PriceNotFound` |
/// | Text between markers not an integer | `MalformedPrice` |
/// | Negative price | `InvalidPrice` |
pub async fn fetch_price(client: &Client, url: &str, markers: &PriceMarkers) -> FetchOutcome {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    let raw = extract_price(&body, markers).ok_or_else(|| FetchError::PriceNotFound {
        url: url.to_string(),
    })?;

    let price = parse_price(raw).map_err(|e| FetchError::MalformedPrice {
        url: url.to_string(),
        raw: raw.to_string(),
        source: e,
    })?;

    if price < 0 {
        return Err(FetchError::InvalidPrice {
            url: url.to_string(),
            price,
        });
    }

    Ok(price)
}

/// Listing fetcher sharing one HTTP client across all callers
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    markers: PriceMarkers,
}

impl Fetcher {
    pub fn new(client: Client, markers: PriceMarkers) -> Self {
        Self { client, markers }
    }

    /// Builds the client from configuration
    pub fn from_config(
        tracker: &TrackerConfig,
        markers: PriceMarkers,
    ) -> Result<Self, PriceWatchError> {
        Ok(Self::new(build_http_client(tracker)?, markers))
    }
}

#[async_trait]
impl PriceFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        fetch_price(&self.client, url, &self.markers).await
    }
}
