//! In-process trigger facade.
//!
//! The HTTP layer (not part of this crate) maps its endpoints 1:1 onto these
//! operations.

use std::sync::Arc;

use chrono::Utc;

use crate::backlog::{BacklogStore, HarvestedRecord};
use crate::backoff::Backoff;
use crate::config::SyncConfig;
use crate::harvester::{HarvestError, UserHarvester};
use crate::ledger::{
    SyncCompletion, SyncLedger, SyncRun, SyncRunQuery, SyncStatus, SyncTrigger, TaskKind,
};
use crate::orchestrator::{RunOptions, RunOutcome, SyncOrchestrator};
use crate::sources::{CatalogClient, TrackerClient, WalkOrder};
use crate::tasks::{TaskContext, default_tasks};
use crate::{Error, Result};

/// Discriminated outcome of one user harvest attempt.
#[derive(Debug, Clone)]
pub enum HarvestOutcome {
    /// Another harvest for the same username is active.
    Busy {
        run: SyncRun,
        active: Vec<SyncRun>,
    },
    Completed {
        run: SyncRun,
        synced: Vec<HarvestedRecord>,
    },
}

pub struct SyncService {
    config: SyncConfig,
    ledger: Arc<dyn SyncLedger>,
    orchestrator: SyncOrchestrator,
    harvester: UserHarvester,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        ledger: Arc<dyn SyncLedger>,
        backlog: Arc<dyn BacklogStore>,
        catalog: Arc<dyn CatalogClient>,
        tracker: Arc<dyn TrackerClient>,
    ) -> Result<Self> {
        config.validate()?;

        let backoff = Backoff::from_config(&config);
        let ctx = TaskContext::new(backlog.clone(), catalog, backoff);
        let orchestrator =
            SyncOrchestrator::new(ledger.clone(), default_tasks(ctx), config.task_limit);
        let harvester = UserHarvester::new(tracker, backlog);

        Ok(Self {
            config,
            ledger,
            orchestrator,
            harvester,
        })
    }

    /// Run one system sync: the orchestrator's priority scan (or a pinned
    /// task), bracketed by a ledger entry.
    pub async fn run_system_sync(&self, options: RunOptions) -> Result<RunOutcome> {
        self.orchestrator.run_once(options).await
    }

    /// Harvest one user's watches and ratings, bracketed by a per-username
    /// ledger entry. On failure the partial count is recorded on the ledger
    /// and the error, still carrying the partial records, is re-raised.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run_user_harvest(
        &self,
        username: &str,
        order: WalkOrder,
    ) -> std::result::Result<HarvestOutcome, HarvestError> {
        let queued = self
            .ledger
            .queue_sync(SyncTrigger::User, Some(username))
            .await
            .map_err(|cause| bare_failure(username, cause))?;

        if !queued.already_running.is_empty() {
            tracing::info!(
                username,
                active = queued.already_running.len(),
                "another harvest for this account is active, skipping"
            );
            let run = self
                .ledger
                .skip_sync(queued.run)
                .await
                .map_err(|cause| bare_failure(username, cause))?;
            return Ok(HarvestOutcome::Busy {
                run,
                active: queued.already_running,
            });
        }

        let run = self
            .ledger
            .start_sync(queued.run)
            .await
            .map_err(|cause| bare_failure(username, cause))?;

        match self.harvester.harvest_user(username, order).await {
            Ok(report) => {
                let run = self
                    .ledger
                    .end_sync(
                        run,
                        SyncCompletion::complete(TaskKind::UserHarvest, report.synced.len() as u64),
                    )
                    .await
                    .map_err(|cause| bare_failure(username, cause))?;
                Ok(HarvestOutcome::Completed {
                    run,
                    synced: report.synced,
                })
            }
            Err(err) => {
                // Record what was pulled before the failure; the error keeps
                // carrying the records themselves.
                let completion = SyncCompletion {
                    status: Some(SyncStatus::Failed),
                    kind: Some(TaskKind::UserHarvest),
                    num_synced: Some(err.synced.len() as u64),
                    error_message: Some(err.cause.to_string()),
                };
                let _ = self.ledger.end_sync(run, completion).await;
                Err(err)
            }
        }
    }

    /// Run history, newest first (read model for display layers).
    pub async fn history(&self, query: SyncRunQuery) -> Result<Vec<SyncRun>> {
        self.ledger.list_runs(query).await
    }

    /// Sweep runs stuck `Pending`/`InProgress` longer than the configured
    /// staleness threshold.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn clear_unfinished(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.config.stale_run_after();
        let swept = self.ledger.clear_unfinished(cutoff).await?;
        if swept > 0 {
            tracing::warn!(swept, "marked stale sync runs as failed");
        }
        Ok(swept)
    }
}

fn bare_failure(username: &str, cause: Error) -> HarvestError {
    HarvestError {
        username: username.to_string(),
        synced: Vec::new(),
        cause,
    }
}
