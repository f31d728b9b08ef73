//! The item lifecycle as one transition table
//!
//! Every consumption site of a fetch outcome goes through [`transition`],
//! which maps (prior status, classification, retry count) to what the
//! scanner must do with the stored row and with its consecutive-forbidden
//! counter.

use crate::state::{Classification, ItemStatus};

/// Why a row is removed instead of stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    NotFound,
    ForbiddenBudgetExhausted,
    UserProfile,
    BelowPopularity,
}

/// What happens to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Write a terminal status
    Store {
        status: ItemStatus,
        /// Persist the fetched metadata fields
        store_metadata: bool,
        /// New collected flag, or None to leave it as is
        collected: Option<bool>,
        reset_retries: bool,
    },
    /// Keep the row for a later pass with an incremented retry count
    Retry {
        retry_count: u32,
        /// Status to put back (the one held before the attempt)
        restore: ItemStatus,
    },
    Delete(DeleteReason),
}

/// Effect on the scanner's consecutive-forbidden counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEffect {
    Reset,
    Increment,
}

/// Full outcome of one lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: ItemAction,
    pub forbidden: CounterEffect,
    /// Counts toward the process-wide failed total
    pub failed: bool,
}

/// Computes the lifecycle step for one classified fetch
///
/// `retry_count` is the row's count before this attempt and `budget` the
/// number of forbidden outcomes after which the row is purged.
pub fn transition(
    prior: ItemStatus,
    classification: Classification,
    retry_count: u32,
    budget: u32,
) -> Transition {
    match classification {
        Classification::Active => Transition {
            action: ItemAction::Store {
                status: ItemStatus::Active,
                store_metadata: true,
                collected: Some(true),
                reset_retries: true,
            },
            forbidden: CounterEffect::Reset,
            failed: false,
        },
        Classification::Private | Classification::Quarantined => Transition {
            action: ItemAction::Store {
                status: classification.status(),
                store_metadata: false,
                collected: Some(true),
                reset_retries: true,
            },
            forbidden: CounterEffect::Reset,
            failed: false,
        },
        Classification::NotFound => Transition {
            action: ItemAction::Delete(DeleteReason::NotFound),
            forbidden: CounterEffect::Reset,
            failed: false,
        },
        Classification::Deleted => {
            let retry_count = retry_count.saturating_add(1);
            if retry_count >= budget {
                // The counter is bumped for this 403 and then cleared by the purge
                Transition {
                    action: ItemAction::Delete(DeleteReason::ForbiddenBudgetExhausted),
                    forbidden: CounterEffect::Reset,
                    failed: false,
                }
            } else {
                Transition {
                    action: ItemAction::Retry {
                        retry_count,
                        restore: restorable(prior),
                    },
                    forbidden: CounterEffect::Increment,
                    failed: false,
                }
            }
        }
        Classification::Error => Transition {
            action: ItemAction::Store {
                status: ItemStatus::Error,
                store_metadata: false,
                collected: None,
                reset_retries: false,
            },
            forbidden: CounterEffect::Reset,
            failed: true,
        },
    }
}

/// The status a retried row goes back to
fn restorable(prior: ItemStatus) -> ItemStatus {
    match prior {
        ItemStatus::Processing => ItemStatus::Pending,
        other => other,
    }
}
