//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::ItemStatus;
use crate::storage::{
    CompactReport, FixReport, ProcessingStats, StaleCounts, SubredditMetadata, SubredditRecord,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Unknown status value in database: {0}")]
    InvalidStatus(String),

    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every key is normalized to trimmed lowercase before it reaches the
/// backend; callers may pass names in any case.
pub trait Storage {
    // ===== Item Lifecycle =====

    /// Inserts a new item in `pending` state
    ///
    /// Idempotent: an existing row is left untouched.
    ///
    /// # Returns
    ///
    /// `true` if a row was created, `false` if the key already existed
    fn upsert_pending(&mut self, name: &str) -> StorageResult<bool>;

    /// Writes fetched metadata and marks the row active and refreshed now
    fn update_metadata(&mut self, name: &str, metadata: &SubredditMetadata) -> StorageResult<()>;

    /// Sets the status (and derived accessibility) of a row
    fn set_status(
        &mut self,
        name: &str,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Sets status and error message, and the collected flag when given
    fn set_processing_flags(
        &mut self,
        name: &str,
        status: ItemStatus,
        error_message: Option<&str>,
        collected: Option<bool>,
    ) -> StorageResult<()>;

    /// Overwrites the retry counter of a row
    fn set_retry_count(&mut self, name: &str, retry_count: u32) -> StorageResult<()>;

    /// Deletes a row outright
    ///
    /// # Returns
    ///
    /// `true` if a row was removed
    fn delete(&mut self, name: &str) -> StorageResult<bool>;

    // ===== Lookups =====

    /// Gets a row by key
    fn get(&self, name: &str) -> StorageResult<Option<SubredditRecord>>;

    /// Checks whether a key is tracked
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Lists active, collected items due for a refresh
    ///
    /// Never-refreshed rows come first (most subscribers first), then rows
    /// refreshed longest ago, with subscribers as the tiebreak.
    fn list_for_refresh(
        &self,
        limit: Option<usize>,
        stale_days: u32,
        nsfw_only: bool,
    ) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    /// Counts rows per status
    fn counts_by_status(&self) -> StorageResult<HashMap<ItemStatus, u64>>;

    /// Counts active rows never refreshed and rows refreshed before the cutoff
    fn count_stale(&self, stale_days: u32) -> StorageResult<StaleCounts>;

    /// Gets totals used by progress reports
    fn processing_stats(&self) -> StorageResult<ProcessingStats>;

    /// Gets the total row count
    fn total_count(&self) -> StorageResult<u64>;

    // ===== Maintenance =====

    /// Rebuilds the database file to reclaim space from deleted rows
    fn compact(&mut self) -> StorageResult<CompactReport>;

    /// Repairs rows whose status and collected flag disagree
    fn fix_inconsistent_states(&mut self) -> StorageResult<FixReport>;

    /// Removes user-profile pseudo-subreddits
    ///
    /// # Returns
    ///
    /// The number of rows removed
    fn cleanup_user_profiles(&mut self) -> StorageResult<u64>;
}
