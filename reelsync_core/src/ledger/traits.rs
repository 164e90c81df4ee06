use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{QueuedSync, SyncCompletion, SyncRun, SyncRunQuery, SyncTrigger};
use crate::Result;

/// Persisted run records with the lifecycle state machine and the
/// active-run exclusion query.
///
/// Contract: callers must finalize every queued row through exactly one of
/// `skip_sync` / `end_sync`. `start_sync` is optional: a run may be skipped
/// without ever starting. The engine never deletes rows; `clear_unfinished`
/// is the administrative sweep for abandoned ones.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    /// Insert a new `Pending` run, then report other non-terminal runs in
    /// the same scope (same trigger; for `User` runs, same username).
    async fn queue_sync(
        &self,
        trigger: SyncTrigger,
        username: Option<&str>,
    ) -> Result<QueuedSync>;

    /// Transition to `InProgress`.
    async fn start_sync(&self, run: SyncRun) -> Result<SyncRun>;

    /// Finalize as `Skipped` (another run owned the scope).
    async fn skip_sync(&self, run: SyncRun) -> Result<SyncRun>;

    /// Apply the completion fields, stamp `finished`, persist. The single
    /// finalization path for success and failure alike.
    async fn end_sync(&self, run: SyncRun, completion: SyncCompletion) -> Result<SyncRun>;

    /// Mark `Pending`/`InProgress` runs started before `stale_before` as
    /// `Failed`. Returns how many rows were swept.
    async fn clear_unfinished(&self, stale_before: DateTime<Utc>) -> Result<u64>;

    /// Run history, newest first.
    async fn list_runs(&self, query: SyncRunQuery) -> Result<Vec<SyncRun>>;
}
