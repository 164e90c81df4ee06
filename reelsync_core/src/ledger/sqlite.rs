//! Sqlite-backed ledger.
//!
//! Single-node deployments keep the full, never-deleted run history here.
//! The insert performed by `queue_sync` and its conflicting-row query run in
//! one transaction, which narrows (but does not close) the check-then-act
//! window between overlapping invocations.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::models::{
    QueuedSync, SyncCompletion, SyncRun, SyncRunQuery, SyncStatus, SyncTrigger, TaskKind,
};
use super::traits::SyncLedger;
use crate::{Error, Result};

const SWEEP_MESSAGE: &str = "swept as unfinished";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sync_runs (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  trigger_kind TEXT NOT NULL,
  username TEXT,
  status TEXT NOT NULL,
  started TEXT NOT NULL,
  finished TEXT,
  num_synced INTEGER NOT NULL,
  error_message TEXT
);
CREATE INDEX IF NOT EXISTS sync_runs_scope_idx ON sync_runs(trigger_kind, status, username);
CREATE INDEX IF NOT EXISTS sync_runs_started_idx ON sync_runs(started DESC);
"#;

#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::backend("sqlite_ledger mkdir", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
            .map_err(|e| Error::backend("sqlite_ledger connect options", e))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_ledger connect", e))?;

        Self::with_pool(pool).await
    }

    /// Private per-instance database. A single connection keeps the shared
    /// in-memory store alive for the pool's lifetime.
    pub async fn new_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::backend("sqlite_ledger connect options", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_ledger connect", e))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::backend("sqlite_ledger schema", e))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SyncLedger for SqliteLedger {
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

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO sync_runs
               (id, kind, trigger_kind, username, status, started, finished, num_synced, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(run.id.to_string())
        .bind(kind_to_str(run.kind))
        .bind(trigger_to_str(run.trigger))
        .bind(&run.username)
        .bind(status_to_str(run.status))
        .bind(run.started.to_rfc3339())
        .bind(Option::<String>::None)
        .bind(run.num_synced as i64)
        .bind(&run.error_message)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut sql = String::from(
            "SELECT id, kind, trigger_kind, username, status, started, finished, num_synced, error_message
             FROM sync_runs
             WHERE id != ?1 AND trigger_kind = ?2 AND status IN ('pending', 'in_progress')",
        );
        if trigger == SyncTrigger::User {
            sql.push_str(" AND username = ?3");
        }

        let mut query = sqlx::query(&sql)
            .bind(run.id.to_string())
            .bind(trigger_to_str(trigger));
        if trigger == SyncTrigger::User {
            query = query.bind(username);
        }
        let rows = query.fetch_all(&mut *tx).await.map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let already_running = rows
            .iter()
            .map(row_to_run)
            .collect::<Result<Vec<SyncRun>>>()?;
        Ok(QueuedSync {
            run,
            already_running,
        })
    }

    async fn start_sync(&self, mut run: SyncRun) -> Result<SyncRun> {
        run.status = SyncStatus::InProgress;
        sqlx::query("UPDATE sync_runs SET status = ?2 WHERE id = ?1")
            .bind(run.id.to_string())
            .bind(status_to_str(run.status))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(run)
    }

    async fn skip_sync(&self, mut run: SyncRun) -> Result<SyncRun> {
        run.status = SyncStatus::Skipped;
        run.finished = Some(Utc::now());
        run.num_synced = 0;
        self.persist(&run).await?;
        Ok(run)
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
        self.persist(&run).await?;
        Ok(run)
    }

    async fn clear_unfinished(&self, stale_before: DateTime<Utc>) -> Result<u64> {
        let outcome = sqlx::query(
            "UPDATE sync_runs
             SET status = 'failed', finished = ?1, error_message = ?2
             WHERE status IN ('pending', 'in_progress') AND started < ?3",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(SWEEP_MESSAGE)
        .bind(stale_before.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(outcome.rows_affected())
    }

    async fn list_runs(&self, query: SyncRunQuery) -> Result<Vec<SyncRun>> {
        let mut conditions = vec!["1 = 1".to_string()];
        let mut next_param = 1;

        if query.trigger.is_some() {
            conditions.push(format!("trigger_kind = ?{next_param}"));
            next_param += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("status = ?{next_param}"));
            next_param += 1;
        }
        if query.username.is_some() {
            conditions.push(format!("username = ?{next_param}"));
            next_param += 1;
        }
        if query.since.is_some() {
            conditions.push(format!("started >= ?{next_param}"));
            next_param += 1;
        }
        if query.until.is_some() {
            conditions.push(format!("started <= ?{next_param}"));
            next_param += 1;
        }

        let sql = format!(
            "SELECT id, kind, trigger_kind, username, status, started, finished, num_synced, error_message
             FROM sync_runs WHERE {}
             ORDER BY started DESC
             LIMIT ?{next_param} OFFSET ?{}",
            conditions.join(" AND "),
            next_param + 1,
        );

        let mut q = sqlx::query(&sql);
        if let Some(trigger) = query.trigger {
            q = q.bind(trigger_to_str(trigger));
        }
        if let Some(status) = query.status {
            q = q.bind(status_to_str(status));
        }
        if let Some(username) = &query.username {
            q = q.bind(username.clone());
        }
        if let Some(since) = &query.since {
            q = q.bind(since.to_rfc3339());
        }
        if let Some(until) = &query.until {
            q = q.bind(until.to_rfc3339());
        }
        q = q.bind(query.limit as i64).bind(query.offset as i64);

        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(row_to_run).collect()
    }
}

impl SqliteLedger {
    async fn persist(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            "UPDATE sync_runs
             SET kind = ?2, status = ?3, finished = ?4, num_synced = ?5, error_message = ?6
             WHERE id = ?1",
        )
        .bind(run.id.to_string())
        .bind(kind_to_str(run.kind))
        .bind(status_to_str(run.status))
        .bind(run.finished.map(|t| t.to_rfc3339()))
        .bind(run.num_synced as i64)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────

fn db_err(e: sqlx::Error) -> Error {
    Error::backend("sqlite_ledger", e)
}

fn status_to_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Pending => "pending",
        SyncStatus::InProgress => "in_progress",
        SyncStatus::Complete => "complete",
        SyncStatus::Failed => "failed",
        SyncStatus::Skipped => "skipped",
    }
}

fn status_from_str(s: &str) -> Result<SyncStatus> {
    match s {
        "pending" => Ok(SyncStatus::Pending),
        "in_progress" => Ok(SyncStatus::InProgress),
        "complete" => Ok(SyncStatus::Complete),
        "failed" => Ok(SyncStatus::Failed),
        "skipped" => Ok(SyncStatus::Skipped),
        other => Err(Error::BackendMessage(format!(
            "unknown sync status '{other}'"
        ))),
    }
}

fn trigger_to_str(trigger: SyncTrigger) -> &'static str {
    match trigger {
        SyncTrigger::System => "system",
        SyncTrigger::User => "user",
    }
}

fn trigger_from_str(s: &str) -> Result<SyncTrigger> {
    match s {
        "system" => Ok(SyncTrigger::System),
        "user" => Ok(SyncTrigger::User),
        other => Err(Error::BackendMessage(format!(
            "unknown sync trigger '{other}'"
        ))),
    }
}

fn kind_to_str(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Unknown => "unknown",
        TaskKind::None => "none",
        TaskKind::PopularByYear => "popular_by_year",
        TaskKind::PopularByGenre => "popular_by_genre",
        TaskKind::EntryMovies => "entry_movies",
        TaskKind::PopularMovies => "popular_movies",
        TaskKind::MovieCredits => "movie_credits",
        TaskKind::CastPeople => "cast_people",
        TaskKind::CrewPeople => "crew_people",
        TaskKind::MovieCollections => "movie_collections",
        TaskKind::UserHarvest => "user_harvest",
    }
}

fn kind_from_str(s: &str) -> Result<TaskKind> {
    match s {
        "unknown" => Ok(TaskKind::Unknown),
        "none" => Ok(TaskKind::None),
        "popular_by_year" => Ok(TaskKind::PopularByYear),
        "popular_by_genre" => Ok(TaskKind::PopularByGenre),
        "entry_movies" => Ok(TaskKind::EntryMovies),
        "popular_movies" => Ok(TaskKind::PopularMovies),
        "movie_credits" => Ok(TaskKind::MovieCredits),
        "cast_people" => Ok(TaskKind::CastPeople),
        "crew_people" => Ok(TaskKind::CrewPeople),
        "movie_collections" => Ok(TaskKind::MovieCollections),
        "user_harvest" => Ok(TaskKind::UserHarvest),
        other => Err(Error::BackendMessage(format!("unknown task kind '{other}'"))),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::backend("parse sync run timestamp", e))
}

fn row_to_run(row: &SqliteRow) -> Result<SyncRun> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let trigger: String = row.get("trigger_kind");
    let status: String = row.get("status");
    let started: String = row.get("started");
    let finished: Option<String> = row.get("finished");
    let num_synced: i64 = row.get("num_synced");

    Ok(SyncRun {
        id: Uuid::parse_str(&id).map_err(|e| Error::backend("parse sync run id", e))?,
        kind: kind_from_str(&kind)?,
        trigger: trigger_from_str(&trigger)?,
        username: row.get("username"),
        status: status_from_str(&status)?,
        started: parse_timestamp(&started)?,
        finished: finished.as_deref().map(parse_timestamp).transpose()?,
        num_synced: num_synced as u64,
        error_message: row.get("error_message"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_the_full_lifecycle() {
        let ledger = SqliteLedger::new_in_memory().await.unwrap();
        let queued = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert!(queued.already_running.is_empty());
        assert_eq!(queued.run.kind, TaskKind::Unknown);

        let run = ledger.start_sync(queued.run).await.unwrap();
        let done = ledger
            .end_sync(run, SyncCompletion::complete(TaskKind::MovieCredits, 3))
            .await
            .unwrap();

        let listed = ledger.list_runs(SyncRunQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], done);
    }

    #[tokio::test]
    async fn queue_sees_pending_and_in_progress_rows() {
        let ledger = SqliteLedger::new_in_memory().await.unwrap();
        let first = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();

        // Still pending: visible to the next queue call.
        let second = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert_eq!(second.already_running.len(), 1);
        assert_eq!(second.already_running[0].id, first.run.id);

        ledger.skip_sync(second.run).await.unwrap();
        ledger.start_sync(first.run.clone()).await.unwrap();

        let third = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        assert_eq!(third.already_running.len(), 1);
        assert_eq!(third.already_running[0].status, SyncStatus::InProgress);
    }

    #[tokio::test]
    async fn user_scope_is_keyed_by_username() {
        let ledger = SqliteLedger::new_in_memory().await.unwrap();
        ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();

        let bob = ledger
            .queue_sync(SyncTrigger::User, Some("bob"))
            .await
            .unwrap();
        assert!(bob.already_running.is_empty());

        let alice_again = ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();
        assert_eq!(alice_again.already_running.len(), 1);
    }

    #[tokio::test]
    async fn clear_unfinished_fails_stale_rows() {
        let ledger = SqliteLedger::new_in_memory().await.unwrap();
        let queued = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        ledger.start_sync(queued.run).await.unwrap();

        let swept = ledger
            .clear_unfinished(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(swept, 1);

        let failed = ledger
            .list_runs(SyncRunQuery {
                status: Some(SyncStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_message.as_deref(), Some(SWEEP_MESSAGE));
    }

    #[tokio::test]
    async fn list_runs_applies_filters() {
        let ledger = SqliteLedger::new_in_memory().await.unwrap();
        let system = ledger.queue_sync(SyncTrigger::System, None).await.unwrap();
        ledger
            .end_sync(system.run, SyncCompletion::complete(TaskKind::None, 0))
            .await
            .unwrap();
        let user = ledger
            .queue_sync(SyncTrigger::User, Some("alice"))
            .await
            .unwrap();
        ledger
            .end_sync(
                user.run,
                SyncCompletion::failed("tracker unreachable", 2),
            )
            .await
            .unwrap();

        let failures = ledger
            .list_runs(SyncRunQuery {
                trigger: Some(SyncTrigger::User),
                status: Some(SyncStatus::Failed),
                username: Some("alice".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].num_synced, 2);
        assert_eq!(
            failures[0].error_message.as_deref(),
            Some("tracker unreachable")
        );
    }
}
