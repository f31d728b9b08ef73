//! Storage module for persisting scan results
//!
//! This module handles all database operations for the scanner, including:
//! - SQLite database initialization and schema management
//! - Item lifecycle persistence (pending, terminal statuses, retry counts)
//! - Staleness queries that drive refresh runs
//! - Aggregate counts and maintenance (compaction, state repair)

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, initialize_schema, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ItemStatus;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Normalizes an item key: trimmed and lowercase
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Returns true if the key names a user profile rather than a subreddit
pub fn is_user_profile_name(name: &str) -> bool {
    normalize_name(name).starts_with("u_")
}

/// Metadata fields written on a successful fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubredditMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subscribers: Option<i64>,
    pub active_users: Option<i64>,
    pub over_18: bool,
    pub subreddit_type: Option<String>,
    pub created_utc: Option<i64>,
    pub icon_url: Option<String>,
    pub primary_color: Option<String>,
    pub advertiser_category: Option<String>,
    pub submission_type: Option<String>,
    pub allow_images: bool,
    pub allow_videos: bool,
    pub allow_galleries: bool,
    pub allow_videogifs: bool,
    pub allow_polls: bool,
    pub link_flair_enabled: bool,
    pub spoilers_enabled: bool,
    pub whitelist_status: Option<i64>,
    pub language: Option<String>,
}

/// A stored subreddit row
#[derive(Debug, Clone)]
pub struct SubredditRecord {
    pub name: String,
    pub metadata: SubredditMetadata,
    pub status: ItemStatus,
    pub is_accessible: bool,
    pub collected: bool,
    pub retry_count: u32,
    /// Epoch seconds of the last successful fetch
    pub last_updated: Option<i64>,
    pub error_message: Option<String>,
}

/// Rows due for a refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleCounts {
    pub never_updated: u64,
    pub stale: u64,
    pub total: u64,
}

/// Totals used in progress reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total: u64,
    pub collected: u64,
    /// Rows not collected yet, pending, or in error
    pub outstanding: u64,
}

/// Database size before and after compaction, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactReport {
    pub size_before: u64,
    pub size_after: u64,
}

impl CompactReport {
    pub fn saved(&self) -> u64 {
        self.size_before.saturating_sub(self.size_after)
    }
}

/// Rows repaired by `fix_inconsistent_states`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixReport {
    /// `pending` rows that claimed collected metadata
    pub pending_with_metadata: u64,
    /// `completed` rows without metadata, reset to pending
    pub completed_without_metadata: u64,
}

impl FixReport {
    pub fn total(&self) -> u64 {
        self.pending_with_metadata + self.completed_without_metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  AskReddit "), "askreddit");
        assert_eq!(normalize_name("rust"), "rust");
    }

    #[test]
    fn test_user_profile_names() {
        assert!(is_user_profile_name("u_spez"));
        assert!(is_user_profile_name("U_Someone"));
        assert!(!is_user_profile_name("unixporn"));
    }
}
