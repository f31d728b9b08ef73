//! Statistics generation from the scan database
//!
//! This module provides functionality for extracting and displaying
//! store statistics from the storage layer.

use crate::state::ItemStatus;
use crate::storage::{ProcessingStats, StaleCounts, Storage};
use crate::ScannerError;
use std::collections::HashMap;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct ScanStatistics {
    /// Total number of tracked subreddits
    pub total: u64,

    /// Count of rows by status
    pub by_status: HashMap<ItemStatus, u64>,

    /// Active rows due for a refresh
    pub stale: StaleCounts,

    pub stale_days: u32,

    pub processing: ProcessingStats,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `stale_days` - Age after which an active row counts as stale
///
/// # Returns
///
/// * `Ok(ScanStatistics)` - Successfully loaded statistics
/// * `Err(ScannerError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    stale_days: u32,
) -> Result<ScanStatistics, ScannerError> {
    Ok(ScanStatistics {
        total: storage.total_count()?,
        by_status: storage.counts_by_status()?,
        stale: storage.count_stale(stale_days)?,
        stale_days,
        processing: storage.processing_stats()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ScanStatistics) {
    println!("=== Scan Statistics ===\n");

    println!("Overview:");
    println!("  Total subreddits: {}", stats.total);
    println!("  Metadata collected: {}", stats.processing.collected);
    println!("  Outstanding (pending/error/uncollected): {}", stats.processing.outstanding);
    println!();

    println!("Subreddits by Status:");
    let mut status_counts: Vec<_> = stats.by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    for (status, count) in status_counts {
        let percentage = if stats.total > 0 {
            (*count as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Refresh Queue (older than {} days):", stats.stale_days);
    println!("  Never updated: {}", stats.stale.never_updated);
    println!("  Stale: {}", stats.stale.stale);
    println!("  Total due: {}", stats.stale.total);
}
