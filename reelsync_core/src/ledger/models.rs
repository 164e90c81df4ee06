use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What started a run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Orchestrator-initiated catalog drain.
    System,
    /// Harvester-initiated on behalf of a specific account.
    User,
}

/// Lifecycle state of a run. Terminal states are `Complete`, `Failed`,
/// `Skipped`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Skipped,
}

impl SyncStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncStatus::Complete | SyncStatus::Failed | SyncStatus::Skipped
        )
    }
}

/// The unit-of-work categories the orchestrator can run, in its fixed
/// priority order. `Unknown` is the initial value of a queued run; `None`
/// marks a run that found nothing to do anywhere.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Unknown,
    None,
    PopularByYear,
    PopularByGenre,
    EntryMovies,
    PopularMovies,
    MovieCredits,
    CastPeople,
    CrewPeople,
    MovieCollections,
    UserHarvest,
}

/// One record per orchestration or harvest attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub kind: TaskKind,
    pub trigger: SyncTrigger,
    /// Correlates a `User`-triggered run to the account it harvests.
    pub username: Option<String>,
    pub status: SyncStatus,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub num_synced: u64,
    /// Set only on `Failed`.
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn new_pending(
        trigger: SyncTrigger,
        username: Option<String>,
        started: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::Unknown,
            trigger,
            username,
            status: SyncStatus::Pending,
            started,
            finished: None,
            num_synced: 0,
            error_message: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Fields applied by the single finalization path, `end_sync`.
#[derive(Debug, Clone, Default)]
pub struct SyncCompletion {
    pub status: Option<SyncStatus>,
    pub kind: Option<TaskKind>,
    pub num_synced: Option<u64>,
    pub error_message: Option<String>,
}

impl SyncCompletion {
    pub fn complete(kind: TaskKind, num_synced: u64) -> Self {
        Self {
            status: Some(SyncStatus::Complete),
            kind: Some(kind),
            num_synced: Some(num_synced),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>, num_synced: u64) -> Self {
        Self {
            status: Some(SyncStatus::Failed),
            kind: None,
            num_synced: Some(num_synced),
            error_message: Some(message.into()),
        }
    }
}

/// A freshly queued run plus whatever else was active in its scope.
#[derive(Debug, Clone)]
pub struct QueuedSync {
    pub run: SyncRun,
    /// Other non-terminal runs with the same trigger (and username, for
    /// `User` runs) at queue time, excluding `run` itself.
    pub already_running: Vec<SyncRun>,
}

/// History filter for the read model exposed to display layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunQuery {
    pub trigger: Option<SyncTrigger>,
    pub status: Option<SyncStatus>,
    pub username: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SyncRunQuery {
    fn default() -> Self {
        Self {
            trigger: None,
            status: None,
            username: None,
            since: None,
            until: None,
            limit: 100,
            offset: 0,
        }
    }
}
