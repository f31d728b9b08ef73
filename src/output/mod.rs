//! Output module for console reports
//!
//! This module handles:
//! - Store statistics for the stats mode
//! - End-of-run summaries for scans, dedupes and maintenance

mod report;
pub mod stats;

pub use report::{describe_outcome, print_compact_report, print_dedupe_report, print_run_summary};
pub use stats::{load_statistics, print_statistics, ScanStatistics};
