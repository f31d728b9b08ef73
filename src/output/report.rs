//! End-of-run console reports

use crate::client::ClientStats;
use crate::limiter::LimiterStats;
use crate::scanner::{RunOutcome, RunSummary};
use crate::storage::{CompactReport, FixReport};
use crate::worklist::DedupeReport;

/// One-line description of how a run ended
pub fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed => "completed".to_string(),
        RunOutcome::Halted(reason) => format!("halted ({})", reason),
        RunOutcome::Interrupted => "interrupted".to_string(),
    }
}

pub fn print_run_summary(summary: &RunSummary, client: &ClientStats, limiter: &LimiterStats) {
    println!("=== Scan Complete: {} ===\n", describe_outcome(&summary.outcome));

    println!("Items:");
    println!("  Processed: {}", summary.processed);
    println!("  Stored: {}", summary.stored);
    println!("  Deleted: {}", summary.deleted);
    println!("  Retrying (403): {}", summary.retrying);
    println!("  Errors: {}", summary.failed);
    if summary.duplicates > 0 {
        println!("  Duplicates removed: {}", summary.duplicates);
    }
    if let Some(remaining) = summary.list_remaining {
        println!("  Remaining in list: {}", remaining);
    }
    println!();

    println!("Requests:");
    println!("  Total: {}", client.total_requests);
    println!("  Failed: {}", client.failed_requests);
    println!("  Rate limit hits (429): {}", client.rate_limit_hits);
    println!("  Diversity requests: {}", client.diversity_requests);
    println!("  Success rate: {:.1}%", client.success_rate());
    println!();

    println!("Rate Limiter:");
    println!("  Granted: {}", limiter.total_granted);
    println!("  Blocked: {}", limiter.total_blocked);
    println!("  Average wait: {:.2?}", limiter.average_wait);
}

pub fn print_dedupe_report(report: &DedupeReport) {
    println!("=== Work List Cleaned ===\n");
    println!("  Started with: {}", report.initial);
    println!("  Internal duplicates: {} (removed)", report.internal_duplicates);
    println!("  Already in database: {} (removed)", report.store_duplicates);
    println!("  Total removed: {}", report.removed());
    println!("  Remaining in list: {}", report.kept);
}

pub fn print_compact_report(fixed: &FixReport, compact: &CompactReport) {
    println!("=== Database Maintenance ===\n");
    println!("  Pending rows with stale collected flag: {}", fixed.pending_with_metadata);
    println!("  Completed rows without metadata: {}", fixed.completed_without_metadata);
    println!(
        "  Size: {:.2} MB -> {:.2} MB (saved {:.2} MB)",
        megabytes(compact.size_before),
        megabytes(compact.size_after),
        megabytes(compact.saved())
    );
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::HaltReason;

    #[test]
    fn test_describe_outcome() {
        assert_eq!(describe_outcome(&RunOutcome::Completed), "completed");
        assert_eq!(
            describe_outcome(&RunOutcome::Halted(HaltReason::RateLimited(3))),
            "halted (3 rate limit hits (429s))"
        );
    }

    #[test]
    fn test_megabytes() {
        assert!((megabytes(1024 * 1024) - 1.0).abs() < f64::EPSILON);
    }
}
