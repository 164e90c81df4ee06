//! Backlog-driven task executors.
//!
//! Every executor follows the same template: ask the backlog store for up to
//! `limit` unresolved keys of its kind (empty is the common answer, and the
//! orchestrator falls through to the next task), resolve each key against the
//! catalog through the backoff executor, and upsert the result. A fetch that
//! comes back definitively absent marks the item unsyncable and the loop
//! continues; anything else (retry exhaustion, a store write failure)
//! propagates and fails the whole run.

pub mod collections;
pub mod credits;
pub mod movies;
pub mod people;
pub mod popular;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::backlog::BacklogStore;
use crate::backoff::Backoff;
use crate::ledger::TaskKind;
use crate::sources::CatalogClient;

pub use collections::MovieCollectionsTask;
pub use credits::MovieCreditsTask;
pub use movies::{EntryMoviesTask, PopularMoviesTask};
pub use people::{CastPeopleTask, CrewPeopleTask};
pub use popular::{PopularByGenreTask, PopularByYearTask};

/// One unit-of-work handler the orchestrator can run.
#[async_trait]
pub trait SyncTask: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Resolve up to `limit` backlog items; returns how many were actually
    /// synced (successfully upserted), not how many were attempted.
    async fn execute(&self, limit: usize) -> Result<u64>;
}

/// Shared dependencies for the catalog-backed executors.
#[derive(Clone)]
pub struct TaskContext {
    pub backlog: Arc<dyn BacklogStore>,
    pub catalog: Arc<dyn CatalogClient>,
    pub backoff: Backoff,
}

impl TaskContext {
    pub fn new(
        backlog: Arc<dyn BacklogStore>,
        catalog: Arc<dyn CatalogClient>,
        backoff: Backoff,
    ) -> Self {
        Self {
            backlog,
            catalog,
            backoff,
        }
    }
}

/// The full executor set in the orchestrator's priority order: foundational
/// records first, so movies exist before credits resolve and credits exist
/// before the people they reference.
pub fn default_tasks(ctx: TaskContext) -> Vec<Arc<dyn SyncTask>> {
    vec![
        Arc::new(PopularByYearTask::new(ctx.clone())),
        Arc::new(PopularByGenreTask::new(ctx.clone())),
        Arc::new(EntryMoviesTask::new(ctx.clone())),
        Arc::new(PopularMoviesTask::new(ctx.clone())),
        Arc::new(MovieCreditsTask::new(ctx.clone())),
        Arc::new(CastPeopleTask::new(ctx.clone())),
        Arc::new(CrewPeopleTask::new(ctx.clone())),
        Arc::new(MovieCollectionsTask::new(ctx)),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::sources::{
        CatalogClient, CatalogCollection, CatalogCredits, CatalogMovie, CatalogMovieSummary,
        CatalogPerson, PopularScope,
    };
    use crate::{Error, Result};

    /// Scripted catalog: known records resolve, everything else is absent.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub movies: HashMap<i64, CatalogMovie>,
        pub credits: HashMap<i64, CatalogCredits>,
        pub people: HashMap<i64, CatalogPerson>,
        pub collections: HashMap<i64, CatalogCollection>,
        pub popular: HashMap<PopularScope, Vec<CatalogMovieSummary>>,
        /// Ids that fail with a retryable error instead of resolving.
        pub flaky: HashSet<i64>,
        pub calls: AtomicU32,
    }

    impl FakeCatalog {
        pub(crate) fn with_movie(mut self, movie: CatalogMovie) -> Self {
            self.movies.insert(movie.external_id, movie);
            self
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn movie(external_id: i64, title: &str) -> CatalogMovie {
        CatalogMovie {
            external_id,
            title: title.to_string(),
            release_year: Some(1999),
            runtime_minutes: Some(136),
            overview: None,
            collection_external_id: None,
            genre_ids: vec![28],
        }
    }

    pub(crate) fn person(external_id: i64, name: &str) -> CatalogPerson {
        CatalogPerson {
            external_id,
            name: name.to_string(),
            known_for_department: Some("Acting".to_string()),
            birthday: None,
        }
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn movie(&self, external_id: i64) -> Result<CatalogMovie> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.flaky.contains(&external_id) {
                return Err(Error::BackendMessage("catalog unreachable".to_string()));
            }
            self.movies
                .get(&external_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("movie {external_id}")))
        }

        async fn movie_credits(&self, external_id: i64) -> Result<CatalogCredits> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.credits
                .get(&external_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("credits for movie {external_id}")))
        }

        async fn person(&self, external_id: i64) -> Result<CatalogPerson> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.people
                .get(&external_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("person {external_id}")))
        }

        async fn collection(&self, external_id: i64) -> Result<CatalogCollection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.collections
                .get(&external_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("collection {external_id}")))
        }

        async fn popular(
            &self,
            scope: PopularScope,
            _page: u32,
        ) -> Result<Vec<CatalogMovieSummary>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.popular
                .get(&scope)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("popular listing {scope:?}")))
        }
    }

    pub(crate) fn fast_backoff() -> crate::backoff::Backoff {
        crate::backoff::Backoff::new(1, 0, 0)
    }
}
