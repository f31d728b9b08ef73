//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the scanner database.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::{Connection, OptionalExtension};

/// Version written to `schema_version` for fresh databases
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per subreddit, keyed by lowercase name
CREATE TABLE IF NOT EXISTS subreddits (
    name TEXT PRIMARY KEY,
    -- Metadata from the API
    title TEXT,
    description TEXT,
    subscribers INTEGER,
    active_users INTEGER,
    over_18 INTEGER,
    subreddit_type TEXT,
    created_utc INTEGER,
    -- Branding
    icon_url TEXT,
    primary_color TEXT,
    -- Content flags
    advertiser_category TEXT,
    submission_type TEXT,
    allow_images INTEGER DEFAULT 1,
    allow_videos INTEGER DEFAULT 1,
    allow_galleries INTEGER DEFAULT 0,
    allow_videogifs INTEGER DEFAULT 0,
    allow_polls INTEGER DEFAULT 0,
    link_flair_enabled INTEGER DEFAULT 0,
    spoilers_enabled INTEGER DEFAULT 0,
    whitelist_status INTEGER,
    language TEXT DEFAULT 'en',
    -- Lifecycle
    status TEXT NOT NULL DEFAULT 'pending',
    is_accessible INTEGER NOT NULL DEFAULT 1,
    last_updated INTEGER,
    retry_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    metadata_collected INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE INDEX IF NOT EXISTS idx_subreddits_status ON subreddits(status);
CREATE INDEX IF NOT EXISTS idx_subreddits_collected ON subreddits(metadata_collected);
CREATE INDEX IF NOT EXISTS idx_subreddits_subscribers ON subreddits(subscribers DESC);
CREATE INDEX IF NOT EXISTS idx_subreddits_last_updated ON subreddits(last_updated);
"#;

/// Initializes the database schema
///
/// Creates missing tables and records the schema version on fresh
/// databases. Refuses to open a database written by a newer version.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match version {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
            tracing::info!("Initialized database with schema version {}", SCHEMA_VERSION);
        }
        Some(found) if found > SCHEMA_VERSION => {
            return Err(StorageError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Some(_) => {}
    }

    Ok(())
}

/// Gets the schema version recorded in the database
pub fn get_schema_version(conn: &Connection) -> StorageResult<u32> {
    Ok(conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?)
}
