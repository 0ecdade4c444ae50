/// Confirmation state definitions
///
/// A subscriber moves `NoRecord -> Pending` when a hash is issued, then either
/// `Pending -> Confirmed` by following the link in time, or
/// `Pending -> Expired` once the deadline passes. Following an expired link
/// re-issues the hash and returns the subscriber to `Pending`.
use crate::storage::ConfirmationRecord;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmationState {
    /// Unconfirmed, no hash issued
    NoRecord,
    /// Unconfirmed, hash issued and still valid
    Pending,
    /// Unconfirmed, hash issued but its deadline has passed
    Expired,
    /// Email confirmed; no further transitions
    Confirmed,
}

impl ConfirmationState {
    /// Derives the state from what the stores hold
    pub fn of(record: Option<&ConfirmationRecord>, verified: bool, now: DateTime<Utc>) -> Self {
        if verified {
            return Self::Confirmed;
        }
        match record {
            None => Self::NoRecord,
            Some(r) if r.deadline > now => Self::Pending,
            Some(_) => Self::Expired,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Returns true if following the link in this state triggers a resend
    pub fn needs_reissue(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoRecord => "no_record",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Confirmed => "confirmed",
        };
        write!(f, "{}", s)
    }
}
