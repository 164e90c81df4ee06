//! Cascading task orchestrator.
//!
//! One invocation drains at most one task: executors are tried in a fixed
//! priority order and the first to report work wins the run. Repeated
//! invocations (cron, polling) drain the whole backlog fairly across task
//! kinds without a weighted scheduler.

use std::sync::Arc;

use crate::ledger::{SyncCompletion, SyncLedger, SyncRun, SyncStatus, SyncTrigger, TaskKind};
use crate::tasks::SyncTask;
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Proceed even if another system run is active.
    pub force: bool,
    /// Pin execution to exactly one task kind instead of the priority scan.
    pub force_kind: Option<TaskKind>,
    /// Backlog batch size; the configured default when absent.
    pub limit: Option<usize>,
}

/// Discriminated outcome of one orchestration attempt.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Another run owned the scope; the queued row was finalized `Skipped`
    /// and no task executor ran.
    Busy {
        run: SyncRun,
        active: Vec<SyncRun>,
    },
    Completed {
        run: SyncRun,
    },
}

pub struct SyncOrchestrator {
    ledger: Arc<dyn SyncLedger>,
    /// Ordered priority list; additions here are the only edit new task
    /// kinds need.
    tasks: Vec<Arc<dyn SyncTask>>,
    default_limit: usize,
}

impl SyncOrchestrator {
    pub fn new(
        ledger: Arc<dyn SyncLedger>,
        tasks: Vec<Arc<dyn SyncTask>>,
        default_limit: usize,
    ) -> Self {
        Self {
            ledger,
            tasks,
            default_limit,
        }
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run_once(&self, options: RunOptions) -> Result<RunOutcome> {
        let queued = self.ledger.queue_sync(SyncTrigger::System, None).await?;
        if !queued.already_running.is_empty() && !options.force {
            tracing::info!(
                run_id = %queued.run.id,
                active = queued.already_running.len(),
                "another system sync is active, skipping"
            );
            let run = self.ledger.skip_sync(queued.run).await?;
            return Ok(RunOutcome::Busy {
                run,
                active: queued.already_running,
            });
        }

        let run = self.ledger.start_sync(queued.run).await?;
        let limit = options.limit.unwrap_or(self.default_limit);

        // Records which task was executing so a failed run is ledgered with it.
        let mut attempted: Option<TaskKind> = None;
        match self.drain(options.force_kind, limit, &mut attempted).await {
            Ok((kind, count)) => {
                tracing::info!(run_id = %run.id, ?kind, count, "system sync complete");
                let run = self
                    .ledger
                    .end_sync(run, SyncCompletion::complete(kind, count))
                    .await?;
                Ok(RunOutcome::Completed { run })
            }
            Err(err) => {
                tracing::error!(run_id = %run.id, %err, "system sync failed");
                // Record the failure; the original error is what the caller needs.
                let completion = SyncCompletion {
                    status: Some(SyncStatus::Failed),
                    kind: attempted,
                    num_synced: Some(0),
                    error_message: Some(err.to_string()),
                };
                let _ = self.ledger.end_sync(run, completion).await;
                Err(err)
            }
        }
    }

    /// Find the first task with work, or run exactly the pinned one.
    async fn drain(
        &self,
        force_kind: Option<TaskKind>,
        limit: usize,
        attempted: &mut Option<TaskKind>,
    ) -> Result<(TaskKind, u64)> {
        if let Some(kind) = force_kind {
            let task = self
                .tasks
                .iter()
                .find(|t| t.kind() == kind)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("no task executor for kind {kind:?}"))
                })?;
            *attempted = Some(kind);
            // Zero is not a failure for a pinned task.
            let count = task.execute(limit).await?;
            return Ok((kind, count));
        }

        for task in &self.tasks {
            *attempted = Some(task.kind());
            let count = task.execute(limit).await?;
            if count > 0 {
                return Ok((task.kind(), count));
            }
        }
        *attempted = None;
        Ok((TaskKind::None, 0))
    }
}
