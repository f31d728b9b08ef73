//! Scanner module - the scan loop and its policies
//!
//! # Components
//!
//! - `Scanner`: processes one item at a time in refresh or list-scan mode
//! - `SafetyValve`: auto-termination on 403 streaks and 429 totals
//! - `Pacer`: cooldowns and batch pauses, cut short by cancellation
//! - `dedupe_list`: offline cleanup of a work list against the store

mod coordinator;
mod pacer;
mod safety;

pub use coordinator::{dedupe_list, Scanner};
pub use pacer::{sleep_or_cancel, Pacer};
pub use safety::{HaltReason, SafetyValve};

use crate::state::{DeleteReason, ItemStatus};

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    /// A terminal status was written
    Stored(ItemStatus),
    /// Ambiguous 403; kept with this retry count
    Retrying(u32),
    Deleted(DeleteReason),
    Failed(String),
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Halted(HaltReason),
    Interrupted,
}

/// Totals for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub processed: usize,
    pub stored: usize,
    pub deleted: usize,
    pub retrying: usize,
    pub failed: usize,
    /// List rows skipped because the store already tracks them
    pub duplicates: usize,
    /// Rows left in the work list after a list scan
    pub list_remaining: Option<usize>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed,
            processed: 0,
            stored: 0,
            deleted: 0,
            retrying: 0,
            failed: 0,
            duplicates: 0,
            list_remaining: None,
        }
    }

    pub fn record(&mut self, result: &ItemResult) {
        self.processed += 1;
        match result {
            ItemResult::Stored(_) => self.stored += 1,
            ItemResult::Retrying(_) => self.retrying += 1,
            ItemResult::Deleted(_) => self.deleted += 1,
            ItemResult::Failed(_) => self.failed += 1,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
