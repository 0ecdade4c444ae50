//! Price extraction from listing pages
//!
//! Listings embed their price in page markup as `<prefix><digits><terminator>`
//! (by default `"dynx_price":8792009,`). Extraction is plain substring search;
//! a page whose markup drifts yields "not found" rather than a guess.

use crate::config::ListingConfig;

/// Delimiters surrounding the price in a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceMarkers {
    pub prefix: String,
    pub terminator: String,
}

impl Default for PriceMarkers {
    fn default() -> Self {
        Self::from(&ListingConfig::default())
    }
}

impl From<&ListingConfig> for PriceMarkers {
    fn from(config: &ListingConfig) -> Self {
        Self {
            prefix: config.price_prefix.clone(),
            terminator: config.price_terminator.clone(),
        }
    }
}

/// Returns the text strictly between the first `prefix` and the next
/// `terminator` after it
///
/// # Examples
///
/// ```
/// use price_watch::tracker::extract_between;
///
/// let page = r#"{"id":1,"dynx_price":8792009,"currency":"RUB"}"#;
/// assert_eq!(extract_between(page, "\"dynx_price\":", ","), Some("8792009"));
/// assert_eq!(extract_between("no price here", "\"dynx_price\":", ","), None);
/// ```
pub fn extract_between<'a>(page: &'a str, prefix: &str, terminator: &str) -> Option<&'a str> {
    let start = page.find(prefix)? + prefix.len();
    let rest = &page[start..];
    let end = rest.find(terminator)?;
    Some(&rest[..end])
}

/// Extracts the raw price text from a page using the given markers
pub fn extract_price<'a>(page: &'a str, markers: &PriceMarkers) -> Option<&'a str> {
    extract_between(page, &markers.prefix, &markers.terminator)
}
