use crate::{Error, Result};

/// Engine-wide tuning knobs.
///
/// The embedding application owns where these values come from (env, file,
/// flags); the engine only validates and applies them.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retries allowed per external call on top of the initial attempt.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,

    /// Default backlog batch size per task execution.
    pub task_limit: usize,

    /// Age after which a `Pending`/`InProgress` run is considered abandoned
    /// by `clear_unfinished`. Never applied automatically.
    pub stale_run_after_s: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            task_limit: 25,
            stale_run_after_s: 3_600,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(Error::InvalidInput(
                "backoff_max_ms must be >= backoff_base_ms".to_string(),
            ));
        }
        if self.task_limit == 0 {
            return Err(Error::InvalidInput("task_limit must be > 0".to_string()));
        }
        if self.stale_run_after_s == 0 {
            return Err(Error::InvalidInput(
                "stale_run_after_s must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stale_run_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_run_after_s as i64)
    }
}
