use std::error::Error as StdError;

/// Common error type for `reelsync_core`.
///
/// Backend implementations (sqlite, HTTP clients, etc.) should preserve the
/// underlying error chain where possible via `Error::backend`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external source definitively reported the record absent.
    ///
    /// This is the one classification the backoff executor never retries:
    /// callers use it to mark a backlog item unsyncable instead of
    /// re-attempting it forever.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A scraped record failed structural validation during a harvest walk.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// An external call kept failing past the retry budget.
    #[error("retries exhausted after {attempts} attempts: {context}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    pub fn backend(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Convenience: wrap any error into `Backend` with "reqwest" context.
    pub fn backend_reqwest(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            context: "reqwest".into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
