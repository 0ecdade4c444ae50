//! Listing price tracking
//!
//! This module contains the price-monitoring core, including:
//! - Price extraction from listing markup
//! - HTTP fetching with a shared, bounded-timeout client
//! - The recurring rescan worker pool

mod extractor;
mod fetcher;
mod rescan;

pub use extractor::{extract_between, extract_price, PriceMarkers};
pub use fetcher::{
    build_http_client, fetch_price, parse_price, FetchError, FetchOutcome, Fetcher, PriceFetcher,
};
pub use rescan::{PassStats, RescanScheduler, RescanSettings, TaskOutcome};
