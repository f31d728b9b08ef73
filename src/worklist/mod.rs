//! External work list handling
//!
//! The work list is a CSV file of candidate subreddits. It is read fully
//! into memory, processed, and rewritten to hold only unconsumed rows.

mod file;
mod order;

pub use file::{load, save, WorkRow, HEADER};
pub use order::{dedupe, interleave, sort_by_popularity, DedupeReport};

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing a work list
#[derive(Debug, Error)]
pub enum WorkListError {
    #[error("Work list not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
