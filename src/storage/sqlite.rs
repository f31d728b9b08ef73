//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::ItemStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    normalize_name, CompactReport, FixReport, ProcessingStats, StaleCounts, SubredditMetadata,
    SubredditRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

const RECORD_COLUMNS: &str = "name, title, description, subscribers, active_users, over_18,
    subreddit_type, created_utc, icon_url, primary_color, advertiser_category, submission_type,
    allow_images, allow_videos, allow_galleries, allow_videogifs, allow_polls,
    link_flair_enabled, spoilers_enabled, whitelist_status, language,
    status, is_accessible, metadata_collected, retry_count, last_updated, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA cache_size = -64000;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!("Database connected: {}", path.display());

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn stale_cutoff(stale_days: u32) -> i64 {
        Utc::now().timestamp() - i64::from(stale_days) * SECONDS_PER_DAY
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Fails with `ItemNotFound` when an update touched no row
    fn expect_row(changed: usize, name: &str) -> StorageResult<()> {
        if changed == 0 {
            Err(StorageError::ItemNotFound(name.to_string()))
        } else {
            Ok(())
        }
    }

    fn file_size(&self) -> StorageResult<u64> {
        match &self.path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(SubredditRecord, String)> {
    let status_text: String = row.get(21)?;
    let record = SubredditRecord {
        name: row.get(0)?,
        metadata: SubredditMetadata {
            title: row.get(1)?,
            description: row.get(2)?,
            subscribers: row.get(3)?,
            active_users: row.get(4)?,
            over_18: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
            subreddit_type: row.get(6)?,
            created_utc: row.get(7)?,
            icon_url: row.get(8)?,
            primary_color: row.get(9)?,
            advertiser_category: row.get(10)?,
            submission_type: row.get(11)?,
            allow_images: row.get::<_, Option<bool>>(12)?.unwrap_or(true),
            allow_videos: row.get::<_, Option<bool>>(13)?.unwrap_or(true),
            allow_galleries: row.get::<_, Option<bool>>(14)?.unwrap_or(false),
            allow_videogifs: row.get::<_, Option<bool>>(15)?.unwrap_or(false),
            allow_polls: row.get::<_, Option<bool>>(16)?.unwrap_or(false),
            link_flair_enabled: row.get::<_, Option<bool>>(17)?.unwrap_or(false),
            spoilers_enabled: row.get::<_, Option<bool>>(18)?.unwrap_or(false),
            whitelist_status: row.get(19)?,
            language: row.get(20)?,
        },
        // Placeholder, replaced by the parsed status below
        status: ItemStatus::Pending,
        is_accessible: row.get(22)?,
        collected: row.get(23)?,
        retry_count: row.get::<_, i64>(24)?.max(0) as u32,
        last_updated: row.get(25)?,
        error_message: row.get(26)?,
    };
    Ok((record, status_text))
}

impl Storage for SqliteStorage {
    // ===== Item Lifecycle =====

    fn upsert_pending(&mut self, name: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO subreddits (name, status, metadata_collected)
             VALUES (?1, ?2, 0)",
            params![normalize_name(name), ItemStatus::Pending.to_db_string()],
        )?;
        Ok(changed > 0)
    }

    fn update_metadata(&mut self, name: &str, metadata: &SubredditMetadata) -> StorageResult<()> {
        let now = Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE subreddits SET
                title = ?1,
                description = ?2,
                subscribers = ?3,
                active_users = ?4,
                over_18 = ?5,
                subreddit_type = ?6,
                created_utc = ?7,
                icon_url = ?8,
                primary_color = ?9,
                advertiser_category = ?10,
                submission_type = ?11,
                allow_images = ?12,
                allow_videos = ?13,
                allow_galleries = ?14,
                allow_videogifs = ?15,
                allow_polls = ?16,
                link_flair_enabled = ?17,
                spoilers_enabled = ?18,
                whitelist_status = ?19,
                language = COALESCE(?20, 'en'),
                status = ?21,
                is_accessible = 1,
                last_updated = ?22,
                error_message = NULL
             WHERE name = ?23",
            params![
                metadata.title,
                metadata.description,
                metadata.subscribers,
                metadata.active_users,
                metadata.over_18,
                metadata.subreddit_type,
                metadata.created_utc,
                metadata.icon_url,
                metadata.primary_color,
                metadata.advertiser_category,
                metadata.submission_type,
                metadata.allow_images,
                metadata.allow_videos,
                metadata.allow_galleries,
                metadata.allow_videogifs,
                metadata.allow_polls,
                metadata.link_flair_enabled,
                metadata.spoilers_enabled,
                metadata.whitelist_status,
                metadata.language,
                ItemStatus::Active.to_db_string(),
                now,
                normalize_name(name),
            ],
        )?;
        Self::expect_row(changed, name)
    }

    fn set_status(
        &mut self,
        name: &str,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE subreddits SET status = ?1, is_accessible = ?2, error_message = ?3
             WHERE name = ?4",
            params![
                status.to_db_string(),
                status.is_accessible(),
                error_message,
                normalize_name(name)
            ],
        )?;
        Self::expect_row(changed, name)
    }

    fn set_processing_flags(
        &mut self,
        name: &str,
        status: ItemStatus,
        error_message: Option<&str>,
        collected: Option<bool>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE subreddits SET
                status = ?1,
                is_accessible = ?2,
                error_message = ?3,
                metadata_collected = COALESCE(?4, metadata_collected)
             WHERE name = ?5",
            params![
                status.to_db_string(),
                status.is_accessible(),
                error_message,
                collected,
                normalize_name(name)
            ],
        )?;
        Self::expect_row(changed, name)
    }

    fn set_retry_count(&mut self, name: &str, retry_count: u32) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE subreddits SET retry_count = ?1 WHERE name = ?2",
            params![retry_count, normalize_name(name)],
        )?;
        Self::expect_row(changed, name)
    }

    fn delete(&mut self, name: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM subreddits WHERE name = ?1",
            params![normalize_name(name)],
        )?;
        Ok(changed > 0)
    }

    // ===== Lookups =====

    fn get(&self, name: &str) -> StorageResult<Option<SubredditRecord>> {
        let sql = format!("SELECT {} FROM subreddits WHERE name = ?1", RECORD_COLUMNS);
        let found = self
            .conn
            .query_row(&sql, params![normalize_name(name)], row_to_record)
            .optional()?;

        match found {
            None => Ok(None),
            Some((mut record, status_text)) => {
                record.status = ItemStatus::from_db_string(&status_text)
                    .ok_or(StorageError::InvalidStatus(status_text))?;
                Ok(Some(record))
            }
        }
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM subreddits WHERE name = ?1",
                params![normalize_name(name)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_for_refresh(
        &self,
        limit: Option<usize>,
        stale_days: u32,
        nsfw_only: bool,
    ) -> StorageResult<Vec<String>> {
        let nsfw_clause = if nsfw_only { "AND over_18 = 1" } else { "" };
        let sql = format!(
            "SELECT name FROM subreddits
             WHERE metadata_collected = 1 AND status = ?1
               AND (last_updated IS NULL OR last_updated < ?2)
               {}
             ORDER BY
                CASE WHEN last_updated IS NULL THEN 0 ELSE 1 END ASC,
                CASE WHEN last_updated IS NULL THEN -COALESCE(subscribers, 0) ELSE last_updated END ASC,
                subscribers DESC NULLS LAST
             LIMIT ?3",
            nsfw_clause
        );

        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map(
                params![
                    ItemStatus::Active.to_db_string(),
                    Self::stale_cutoff(stale_days),
                    limit
                ],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }

    // ===== Statistics =====

    fn counts_by_status(&self) -> StorageResult<HashMap<ItemStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM subreddits GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (status_text, count) in rows {
            match ItemStatus::from_db_string(&status_text) {
                Some(status) => {
                    counts.insert(status, count.max(0) as u64);
                }
                None => tracing::warn!("Ignoring unknown status '{}' in counts", status_text),
            }
        }
        Ok(counts)
    }

    fn count_stale(&self, stale_days: u32) -> StorageResult<StaleCounts> {
        let never_updated = self.count(
            "SELECT COUNT(*) FROM subreddits
             WHERE metadata_collected = 1 AND status = ?1 AND last_updated IS NULL",
            params![ItemStatus::Active.to_db_string()],
        )?;

        let stale = self.count(
            "SELECT COUNT(*) FROM subreddits
             WHERE metadata_collected = 1 AND status = ?1
               AND last_updated IS NOT NULL AND last_updated < ?2",
            params![
                ItemStatus::Active.to_db_string(),
                Self::stale_cutoff(stale_days)
            ],
        )?;

        Ok(StaleCounts {
            never_updated,
            stale,
            total: never_updated + stale,
        })
    }

    fn processing_stats(&self) -> StorageResult<ProcessingStats> {
        Ok(ProcessingStats {
            total: self.total_count()?,
            collected: self.count(
                "SELECT COUNT(*) FROM subreddits WHERE metadata_collected = 1",
                [],
            )?,
            outstanding: self.count(
                "SELECT COUNT(*) FROM subreddits
                 WHERE metadata_collected = 0 OR status = ?1 OR status = ?2",
                params![
                    ItemStatus::Error.to_db_string(),
                    ItemStatus::Pending.to_db_string()
                ],
            )?,
        })
    }

    fn total_count(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM subreddits", [])
    }

    // ===== Maintenance =====

    fn compact(&mut self) -> StorageResult<CompactReport> {
        let size_before = self.file_size()?;
        tracing::info!("Compacting database (VACUUM)...");
        self.conn.execute_batch("VACUUM;")?;
        let size_after = self.file_size()?;

        let report = CompactReport {
            size_before,
            size_after,
        };
        tracing::info!(
            "Database compacted: {} -> {} bytes (saved {})",
            report.size_before,
            report.size_after,
            report.saved()
        );
        Ok(report)
    }

    fn fix_inconsistent_states(&mut self) -> StorageResult<FixReport> {
        let tx = self.conn.transaction()?;

        let pending_with_metadata = tx.execute(
            "UPDATE subreddits SET metadata_collected = 0
             WHERE status = ?1 AND metadata_collected = 1",
            params![ItemStatus::Pending.to_db_string()],
        )?;

        let completed_without_metadata = tx.execute(
            "UPDATE subreddits SET status = ?1, is_accessible = 1
             WHERE status = ?2 AND metadata_collected = 0",
            params![
                ItemStatus::Pending.to_db_string(),
                ItemStatus::Completed.to_db_string()
            ],
        )?;

        tx.commit()?;

        let report = FixReport {
            pending_with_metadata: pending_with_metadata as u64,
            completed_without_metadata: completed_without_metadata as u64,
        };
        if report.total() > 0 {
            tracing::info!("Fixed {} inconsistent states in database", report.total());
        }
        Ok(report)
    }

    fn cleanup_user_profiles(&mut self) -> StorageResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM subreddits
             WHERE subreddit_type = 'user' OR substr(name, 1, 2) = 'u_'",
            [],
        )? as u64;

        if removed > 0 {
            tracing::info!("Cleaned up {} user profiles", removed);
        }
        Ok(removed)
    }
}
