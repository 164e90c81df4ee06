use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::models::{
    QueuedSync, SyncCompletion, SyncRun, SyncRunQuery, SyncStatus, SyncTrigger,
};
use super::traits::SyncLedger;
use crate::{Error, Result};

const SWEEP_MESSAGE: &str = "swept as unfinished";

/// In-memory ledger for local development and unit tests.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    runs: Arc<Mutex<Vec<SyncRun>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all runs (primarily for tests).
    pub async fn all_runs(&self) -> Vec<SyncRun> {
        self.runs.lock().await.clone()
    }

    async fn replace(&self, updated: SyncRun) -> Result<SyncRun> {
        let mut runs = self.runs.lock().await;
        let slot = runs
            .iter_mut()
            .find(|r| r.id == updated.id)
            .ok_or_else(|| Error::NotFound(format!("sync run {}", updated.id)))?;
        *slot = updated.clone();
        Ok(updated)
    }
}

fn same_scope(run: &SyncRun, trigger: SyncTrigger, username: Option<&str>) -> bool {
    if run.trigger != trigger {
        return false;
    }
    match trigger {
        SyncTrigger::System => true,
        SyncTrigger::User => run.username.as_deref() == username,
    }
}

#[async_trait]
impl SyncLedger for MemoryLedger {
    async fn queue_sync(
        &self,
        trigger: SyncTrigger,
        username: Option<&str>,
    ) -> Result<QueuedSync> {
        if trigger == SyncTrigger::User && username.map_or(true, |u| u.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "user-triggered run requires a username".to_string(),
            ));
        }

        let run = SyncRun::new_pending(trigger, username.map(str::to_string), Utc::now());
        let mut runs = self.runs.lock().await;
        let already_running = runs
            .iter()
            .filter(|r| r.is_active() && same_scope(r, trigger, username))
            .cloned()
            .collect();
        runs.push(run.clone());
        Ok(QueuedSync {
            run,
            already_running,
        })
    }

    async fn start_sync(&self, mut run: SyncRun) -> Result<SyncRun> {
        run.status = SyncStatus::InProgress;
        self.replace(run).await
    }

    async fn skip_sync(&self, mut run: SyncRun) -> Result<SyncRun> {
        run.status = SyncStatus::Skipped;
        run.finished = Some(Utc::now());
        run.num_synced = 0;
        self.replace(run).await
    }

    async fn end_sync(&self, mut run: SyncRun, completion: SyncCompletion) -> Result<SyncRun> {
        if let Some(status) = completion.status {
            run.status = status;
        }
        if let Some(kind) = completion.kind {
            run.kind = kind;
        }
        if let Some(num_synced) = completion.num_synced {
            run.num_synced = num_synced;
        }
        if let Some(message) = completion.error_message {
            run.error_message = Some(message);
        }
        run.finished = Some(Utc::now());
        self.replace(run).await
    }

    async fn clear_unfinished(&self, stale_before: DateTime<Utc>) -> Result<u64> {
        let mut runs = self.runs.lock().await;
        let mut swept = 0u64;
        for run in runs.iter_mut() {
            if run.is_active() && run.started < stale_before {
                run.status = SyncStatus::Failed;
                run.finished = Some(Utc::now());
                run.error_message = Some(SWEEP_MESSAGE.to_string());
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn list_runs(&self, query: SyncRunQuery) -> Result<Vec<SyncRun>> {
        let runs = self.runs.lock().await;
        let mut out: Vec<SyncRun> = runs
            .iter()
            .filter(|r| query.trigger.is_none_or(|t| r.trigger == t))
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .filter(|r| {
                query
                    .username
                    .as_deref()
                    .is_none_or(|u| r.username.as_deref() == Some(u))
            })
            .filter(|r| query.since.is_none_or(|t| r.started >= t))
            .filter(|r| query.until.is_none_or(|t| r.started <= t))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.started.cmp(&a.started));
        Ok(out.into_iter().skip(query.offset).take(query.limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::TaskKind;

    #[tokio::test]
    async fn queue_reports_active_runs_in_scope() {
        let ledger = MemoryLedger::new();
        let first = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert!(first.already_running.is_empty());
        ledger.start_sync(first.run.clone()).await.unwrap();

        let second = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert_eq!(second.already_running.len(), 1);
        assert_eq!(second.already_running[0].id, first.run.id);
    }

    #[tokio::test]
    async fn user_scopes_are_independent_per_username() {
        let ledger = MemoryLedger::new();
        let alice = ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();
        assert!(alice.already_running.is_empty());

        // A different account is not blocked by alice's pending run.
        let bob = ledger
            .queue_sync(SyncTrigger::User, Some("bob"))
            .await
            .unwrap();
        assert!(bob.already_running.is_empty());

        // A system run is its own scope entirely.
        let system = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert!(system.already_running.is_empty());

        let alice_again = ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();
        assert_eq!(alice_again.already_running.len(), 1);
    }

    #[tokio::test]
    async fn user_run_requires_username() {
        let ledger = MemoryLedger::new();
        let err = ledger.queue_sync(SyncTrigger::User, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn end_sync_is_the_single_finalization_path() {
        let ledger = MemoryLedger::new();
        let queued = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        let run = ledger.start_sync(queued.run).await.unwrap();
        assert_eq!(run.status, SyncStatus::InProgress);
        assert!(run.finished.is_none());

        let done = ledger
            .end_sync(run, SyncCompletion::complete(TaskKind::EntryMovies, 7))
            .await
            .unwrap();
        assert_eq!(done.status, SyncStatus::Complete);
        assert_eq!(done.kind, TaskKind::EntryMovies);
        assert_eq!(done.num_synced, 7);
        assert!(done.finished.is_some());
        assert!(done.error_message.is_none());
    }

    #[tokio::test]
    async fn skip_sync_finalizes_with_zero_synced() {
        let ledger = MemoryLedger::new();
        let queued = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        let skipped = ledger.skip_sync(queued.run).await.unwrap();
        assert_eq!(skipped.status, SyncStatus::Skipped);
        assert_eq!(skipped.num_synced, 0);
        assert!(skipped.finished.is_some());
    }

    #[tokio::test]
    async fn clear_unfinished_sweeps_only_stale_active_runs() {
        let ledger = MemoryLedger::new();
        let stale = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        ledger.start_sync(stale.run.clone()).await.unwrap();

        let fresh = ledger
            .queue_sync(SyncTrigger::User, Some("carol"))
            .await
            .unwrap();
        let done = ledger
            .end_sync(fresh.run, SyncCompletion::complete(TaskKind::UserHarvest, 1))
            .await
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let swept = ledger.clear_unfinished(cutoff).await.unwrap();
        assert_eq!(swept, 1);

        let runs = ledger.all_runs().await;
        let swept_run = runs.iter().find(|r| r.id == stale.run.id).unwrap();
        assert_eq!(swept_run.status, SyncStatus::Failed);
        assert!(swept_run.error_message.is_some());

        // Terminal rows are untouched.
        let done_run = runs.iter().find(|r| r.id == done.id).unwrap();
        assert_eq!(done_run.status, SyncStatus::Complete);
    }

    #[tokio::test]
    async fn list_runs_filters_and_orders_newest_first() {
        let ledger = MemoryLedger::new();
        let a = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        ledger
            .end_sync(a.run, SyncCompletion::complete(TaskKind::None, 0))
            .await
            .unwrap();
        let b = ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();
        ledger.skip_sync(b.run).await.unwrap();

        let all = ledger.list_runs(SyncRunQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].started >= all[1].started);

        let skipped = ledger
            .list_runs(SyncRunQuery {
                status: Some(SyncStatus::Skipped),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].username.as_deref(), Some("alice"));
    }
}
