//! Scanner coordinator - main scan orchestration logic
//!
//! This module contains the scan loops, including:
//! - Building the work order for refresh runs
//! - Draining the external work list in list-scan runs
//! - Applying fetch outcomes to the store through the transition table
//! - Stopping on thresholds and interrupts without tearing an item
//! - Rewriting the work list with unconsumed rows

use crate::client::{ApiClient, FetchOutcome};
use crate::config::Config;
use crate::scanner::{HaltReason, ItemResult, Pacer, RunOutcome, RunSummary, SafetyValve};
use crate::state::{
    transition, Classification, CounterEffect, DeleteReason, ItemAction, ItemStatus,
};
use crate::storage::{normalize_name, Storage, SubredditMetadata};
use crate::worklist::{self, DedupeReport, WorkRow};
use crate::ScannerError;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Main scanner structure
///
/// One instance per process; items are handled strictly one at a time.
pub struct Scanner<S: Storage> {
    config: Config,
    storage: S,
    client: ApiClient,
    cancel: CancellationToken,
    valve: SafetyValve,
    pacer: Pacer,
}

impl<S: Storage> Scanner<S> {
    pub fn new(
        config: Config,
        storage: S,
        mut client: ApiClient,
        cancel: CancellationToken,
    ) -> Self {
        client.set_rate_limit_budget(config.safety.max_total_rate_limited);
        let valve = SafetyValve::new(&config.safety);
        let pacer = Pacer::new(&config.pacing);
        Self {
            config,
            storage,
            client,
            cancel,
            valve,
            pacer,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn consecutive_forbidden(&self) -> u32 {
        self.valve.consecutive_forbidden()
    }

    /// Authenticates before the first item
    pub async fn initialize(&mut self) -> Result<(), ScannerError> {
        self.client.initialize().await?;
        tracing::debug!("Scanner initialized");
        Ok(())
    }

    /// Returns the reason to stop before touching another item, if any
    fn should_stop(&self) -> Option<RunOutcome> {
        if self.cancel.is_cancelled() {
            tracing::info!("Shutdown requested, saving progress...");
            return Some(RunOutcome::Interrupted);
        }
        self.halt_reason().map(RunOutcome::Halted)
    }

    fn halt_reason(&self) -> Option<HaltReason> {
        let reason = self.valve.check(self.client.rate_limit_hits())?;
        tracing::error!("{}. Terminating.", reason);
        Some(reason)
    }

    /// Fetches one item and applies the outcome to the store
    ///
    /// Unknown names are inserted as pending first.
    ///
    /// # Returns
    ///
    /// * `Ok(ItemResult)` - What happened to the item
    /// * `Err(ScannerError)` - A store operation failed mid-item
    pub async fn process_item(&mut self, name: &str) -> Result<ItemResult, ScannerError> {
        self.process(name, None).await
    }

    async fn process(
        &mut self,
        name: &str,
        min_popularity: Option<u64>,
    ) -> Result<ItemResult, ScannerError> {
        let name = normalize_name(name);

        let (prior, retry_count) = match self.storage.get(&name)? {
            Some(record) => (record.status, record.retry_count),
            None => {
                self.storage.upsert_pending(&name)?;
                (ItemStatus::Pending, 0)
            }
        };

        self.storage
            .set_status(&name, ItemStatus::Processing, None)?;

        let outcome = self.client.fetch_info(&name).await;

        if outcome.is_user_profile {
            self.storage.delete(&name)?;
            tracing::info!("r/{:<25} (user profile, removed)", name);
            return Ok(ItemResult::Deleted(DeleteReason::UserProfile));
        }

        if let (Some(floor), Classification::Active) = (min_popularity, outcome.classification) {
            let subscribers = outcome
                .info
                .as_ref()
                .and_then(|info| info.subscribers)
                .unwrap_or(0);
            if subscribers < floor as i64 {
                self.valve.apply(CounterEffect::Reset);
                self.storage.delete(&name)?;
                tracing::info!("r/{:<25} (< {} subs, skipped)", name, floor);
                return Ok(ItemResult::Deleted(DeleteReason::BelowPopularity));
            }
        }

        let step = transition(
            prior,
            outcome.classification,
            retry_count,
            self.config.safety.forbidden_retry_budget,
        );
        self.valve.apply(step.forbidden);

        match step.action {
            ItemAction::Store {
                status,
                store_metadata,
                collected,
                reset_retries,
            } => {
                if store_metadata {
                    if let Some(info) = &outcome.info {
                        self.storage
                            .update_metadata(&name, &SubredditMetadata::from(info))?;
                    }
                }

                let message = status_message(status, &outcome);
                self.storage
                    .set_processing_flags(&name, status, message.as_deref(), collected)?;
                if reset_retries {
                    self.storage.set_retry_count(&name, 0)?;
                }

                if step.failed {
                    let message = message.unwrap_or_else(|| "unknown error".to_string());
                    tracing::error!("r/{} - Error: {}", name, message);
                    Ok(ItemResult::Failed(message))
                } else {
                    log_stored(&name, status, &outcome);
                    Ok(ItemResult::Stored(status))
                }
            }
            ItemAction::Retry {
                retry_count,
                restore,
            } => {
                self.storage.set_retry_count(&name, retry_count)?;
                self.storage.set_status(
                    &name,
                    restore,
                    Some(&format!("403 Forbidden (attempt {})", retry_count)),
                )?;
                tracing::warn!(
                    "r/{:<25} - 403 forbidden (retry {}/{}, {} consecutive)",
                    name,
                    retry_count,
                    self.config.safety.forbidden_retry_budget,
                    self.valve.consecutive_forbidden()
                );
                Ok(ItemResult::Retrying(retry_count))
            }
            ItemAction::Delete(reason) => {
                self.storage.delete(&name)?;
                match reason {
                    DeleteReason::NotFound => {
                        tracing::warn!("r/{:<25} - not found (removed)", name)
                    }
                    _ => tracing::warn!("r/{:<25} - 403 forbidden (purged)", name),
                }
                Ok(ItemResult::Deleted(reason))
            }
        }
    }

    /// Inserts a list item carrying 403 strikes from earlier runs
    fn seed_retries(&mut self, name: &str, retry_count: u32) -> Result<(), ScannerError> {
        self.storage.upsert_pending(name)?;
        self.storage.set_retry_count(name, retry_count)?;
        Ok(())
    }

    /// Drops the store row of an item the work list keeps
    fn forget(&mut self, name: &str) {
        if let Err(e) = self.storage.delete(name) {
            tracing::error!("Failed to remove r/{} from the store: {}", name, e);
        }
    }

    /// Processes an item, turning store failures into an `error` row
    async fn process_guarded(&mut self, name: &str, min_popularity: Option<u64>) -> ItemResult {
        match self.process(name, min_popularity).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                tracing::error!("r/{} - Error: {}", name, message);
                if let Err(mark) =
                    self.storage
                        .set_status(name, ItemStatus::Error, Some(message.as_str()))
                {
                    tracing::error!("Failed to record error for r/{}: {}", name, mark);
                }
                ItemResult::Failed(message)
            }
        }
    }

    fn log_progress(&self, summary: &RunSummary, total: usize) {
        tracing::info!(
            "Progress: {}/{} | stored {} | deleted {} | retrying {} | errors {}",
            summary.processed,
            total,
            summary.stored,
            summary.deleted,
            summary.retrying,
            summary.failed
        );
    }

    /// Refreshes stored items whose metadata is stale
    ///
    /// Never-refreshed items go first, then the oldest, interleaved with
    /// random picks.
    pub async fn run_refresh(
        &mut self,
        limit: Option<usize>,
        nsfw_only: bool,
    ) -> Result<RunSummary, ScannerError> {
        let stale_days = self.config.storage.stale_days;

        self.storage.fix_inconsistent_states()?;
        self.storage.cleanup_user_profiles()?;

        let due = self.storage.count_stale(stale_days)?;
        tracing::info!(
            "Refresh: {} never updated, {} older than {} days",
            due.never_updated,
            due.stale,
            stale_days
        );

        let ordered = self
            .storage
            .list_for_refresh(limit, stale_days, nsfw_only)?;
        let names = worklist::interleave(&ordered, &mut rand::thread_rng());
        tracing::info!("Will process: {} subreddits", names.len());

        let start_time = Instant::now();
        let mut summary = RunSummary::new();

        for name in &names {
            if let Some(outcome) = self.should_stop() {
                summary.outcome = outcome;
                break;
            }

            let result = self.process_guarded(name, None).await;
            summary.record(&result);

            if summary.processed % 10 == 0 {
                self.log_progress(&summary, names.len());
            }

            if let Some(reason) = self.halt_reason() {
                summary.outcome = RunOutcome::Halted(reason);
                break;
            }

            self.pacer.after_item(summary.processed, &self.cancel).await;
        }

        if summary.outcome == RunOutcome::Completed && self.cancel.is_cancelled() {
            summary.outcome = RunOutcome::Interrupted;
        }

        tracing::info!(
            "Refresh finished in {:.1?}: {} processed",
            start_time.elapsed(),
            summary.processed
        );
        Ok(summary)
    }

    /// Scans new items from the work list, dropping rows as they are consumed
    ///
    /// Rows the store already tracks are dropped without a request. Rows
    /// that fail are kept for a later run. The list is rewritten on every
    /// exit path, including interrupts and halts.
    pub async fn run_list_scan(
        &mut self,
        path: &Path,
        limit: Option<usize>,
    ) -> Result<RunSummary, ScannerError> {
        let mut rows = worklist::load(path)?;
        if self.config.work_list.sort_by_popularity {
            worklist::sort_by_popularity(&mut rows);
            tracing::debug!("Sorted work list by subscribers (highest first)");
        }

        let initial = rows.len();
        let limit = limit.unwrap_or(initial);
        tracing::info!(
            "Work list contains {} rows, will process up to {}",
            initial,
            limit.min(initial)
        );

        let mut summary = RunSummary::new();
        let mut keep: Vec<WorkRow> = Vec::new();
        let result = self
            .drain_list(&rows, limit, &mut summary, &mut keep)
            .await;

        if let Err(e) = &result {
            tracing::error!("List scan aborted: {}", e);
        }

        worklist::save(path, &keep)?;
        summary.list_remaining = Some(keep.len());
        tracing::info!(
            "Work list updated: {} -> {} rows ({} removed)",
            initial,
            keep.len(),
            initial.saturating_sub(keep.len())
        );

        result.map(|_| summary)
    }

    async fn drain_list(
        &mut self,
        rows: &[WorkRow],
        limit: usize,
        summary: &mut RunSummary,
        keep: &mut Vec<WorkRow>,
    ) -> Result<(), ScannerError> {
        let floor = Some(self.config.work_list.min_popularity);

        for (idx, row) in rows.iter().enumerate() {
            if summary.processed >= limit {
                keep.extend_from_slice(&rows[idx..]);
                return Ok(());
            }
            if let Some(outcome) = self.should_stop() {
                summary.outcome = outcome;
                keep.extend_from_slice(&rows[idx..]);
                return Ok(());
            }

            let name = normalize_name(&row.name);

            let known = match self.storage.exists(&name) {
                Ok(known) => known,
                Err(e) => {
                    keep.extend_from_slice(&rows[idx..]);
                    return Err(e.into());
                }
            };
            if known {
                summary.duplicates += 1;
                tracing::info!("r/{:<25} (duplicate, removed from list)", name);
                continue;
            }

            if row.retry_count > 0 {
                if let Err(e) = self.seed_retries(&name, row.retry_count) {
                    keep.extend_from_slice(&rows[idx..]);
                    return Err(e);
                }
            }

            let result = self.process_guarded(&name, floor).await;
            // The list owns unfinished items; the next run must not see a duplicate
            match &result {
                ItemResult::Failed(_) => {
                    self.forget(&name);
                    keep.push(row.clone());
                }
                ItemResult::Retrying(retry_count) => {
                    self.forget(&name);
                    keep.push(WorkRow {
                        retry_count: *retry_count,
                        ..row.clone()
                    });
                }
                _ => {}
            }
            summary.record(&result);

            if summary.processed % 10 == 0 {
                tracing::info!(
                    "Progress: {}/{} | stored {} | duplicates removed {} | errors {}",
                    summary.processed,
                    limit.min(rows.len()),
                    summary.stored,
                    summary.duplicates,
                    summary.failed
                );
            }

            if let Some(reason) = self.halt_reason() {
                summary.outcome = RunOutcome::Halted(reason);
                keep.extend_from_slice(&rows[idx + 1..]);
                return Ok(());
            }

            self.pacer.after_item(summary.processed, &self.cancel).await;
        }

        if self.cancel.is_cancelled() {
            summary.outcome = RunOutcome::Interrupted;
        }
        Ok(())
    }
}

/// Error message written alongside a stored status
fn status_message(status: ItemStatus, outcome: &FetchOutcome) -> Option<String> {
    match status {
        ItemStatus::Active => None,
        ItemStatus::Error => Some(
            outcome
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ),
        other => Some(format!("Status: {}", other)),
    }
}

fn log_stored(name: &str, status: ItemStatus, outcome: &FetchOutcome) {
    match (status, &outcome.info) {
        (ItemStatus::Active, Some(info)) => {
            let nsfw_flag = if info.over18.unwrap_or(false) { "NSFW" } else { "    " };
            tracing::info!(
                "r/{:<25} {} {:>12} subs",
                name,
                nsfw_flag,
                info.subscribers.unwrap_or(0)
            );
        }
        _ => tracing::warn!("r/{:<25} - {} (saved status)", name, status),
    }
}

/// Removes repeated rows and rows the store already tracks
///
/// Works offline: no requests, no credentials.
pub fn dedupe_list(
    storage: &dyn Storage,
    path: &Path,
    sort_by_popularity: bool,
) -> Result<DedupeReport, ScannerError> {
    let rows = worklist::load(path)?;
    tracing::info!("Work list contains {} rows", rows.len());

    let (mut kept, report) = worklist::dedupe(rows, |name| storage.exists(name))?;
    if sort_by_popularity {
        worklist::sort_by_popularity(&mut kept);
    }

    worklist::save(path, &kept)?;

    if report.kept == 0 {
        tracing::info!("All subreddits already in database!");
    } else {
        tracing::info!("{} new subreddits ready to scan", report.kept);
    }
    Ok(report)
}
