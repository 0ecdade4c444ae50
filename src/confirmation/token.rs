//! Confirmation hash generation
//!
//! The hash is a capability token, not a password: SHA-256 over a configured
//! secret, the email, the issue time and a per-process counter. It cannot be
//! reversed to the email and differs on every issuance.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Derives a hex-encoded confirmation hash
pub fn generate_hash(secret: &str, email: &str, issued_at: DateTime<Utc>, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update([0u8]);
    hasher.update(email.as_bytes());
    hasher.update([0u8]);
    hasher.update(issued_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    hex::encode(hasher.finalize())
}
