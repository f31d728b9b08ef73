/// Status definitions for tracked subreddits
///
/// This module defines every lifecycle status a stored item can hold, and
/// the closed set of outcomes the API client reports for a metadata fetch.
use std::fmt;

/// Lifecycle status of a stored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemStatus {
    // ===== Active States =====
    /// Discovered, metadata not fetched yet (or due for another attempt)
    Pending,

    /// A fetch for this item is in flight
    Processing,

    // ===== Terminal States =====
    /// Public subreddit with metadata
    Active,

    /// Private subreddit
    Private,

    /// Banned by the platform
    Banned,

    /// Quarantined subreddit
    Quarantined,

    /// Forbidden response that exhausted its retry budget
    Deleted,

    /// Upstream reports no such subreddit
    NotFound,

    /// Fetch failed after all retries
    Error,

    // ===== Legacy =====
    /// Older databases marked finished rows this way; only read, never written
    Completed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 10] = [
        Self::Pending,
        Self::Processing,
        Self::Active,
        Self::Private,
        Self::Banned,
        Self::Quarantined,
        Self::Deleted,
        Self::NotFound,
        Self::Error,
        Self::Completed,
    ];

    /// Returns true if no further processing is expected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if the subreddit can be browsed by the public
    pub fn is_accessible(&self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Active => "active",
            Self::Private => "private",
            Self::Banned => "banned",
            Self::Quarantined => "quarantined",
            Self::Deleted => "deleted",
            Self::NotFound => "notfound",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "active" => Some(Self::Active),
            "private" => Some(Self::Private),
            "banned" => Some(Self::Banned),
            "quarantined" => Some(Self::Quarantined),
            "deleted" => Some(Self::Deleted),
            "notfound" => Some(Self::NotFound),
            "error" => Some(Self::Error),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Outcome of a metadata fetch as reported by the API client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Active,
    Private,
    Quarantined,
    /// HTTP 403: a real ban/deletion or a soft throttle, undecidable per call
    Deleted,
    /// HTTP 404 or a redirect away from the subreddit
    NotFound,
    /// Unrecoverable failure after retries
    Error,
}

impl Classification {
    pub const ALL: [Classification; 6] = [
        Self::Active,
        Self::Private,
        Self::Quarantined,
        Self::Deleted,
        Self::NotFound,
        Self::Error,
    ];

    /// The stored status this outcome maps to
    pub fn status(&self) -> ItemStatus {
        match self {
            Self::Active => ItemStatus::Active,
            Self::Private => ItemStatus::Private,
            Self::Quarantined => ItemStatus::Quarantined,
            Self::Deleted => ItemStatus::Deleted,
            Self::NotFound => ItemStatus::NotFound,
            Self::Error => ItemStatus::Error,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().to_db_string())
    }
}
