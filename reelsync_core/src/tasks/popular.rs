//! Ingest the catalog's popular-movie indexes, partitioned by release year
//! and by genre.

use async_trait::async_trait;

use super::{SyncTask, TaskContext};
use crate::Result;
use crate::backlog::PopularEntry;
use crate::ledger::TaskKind;
use crate::sources::PopularScope;

pub struct PopularByYearTask {
    ctx: TaskContext,
}

impl PopularByYearTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for PopularByYearTask {
    fn kind(&self) -> TaskKind {
        TaskKind::PopularByYear
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let years = self.ctx.backlog.years_missing_popular(limit).await?;
        let scopes = years.into_iter().map(PopularScope::Year).collect();
        ingest_popular(&self.ctx, scopes).await
    }
}

pub struct PopularByGenreTask {
    ctx: TaskContext,
}

impl PopularByGenreTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for PopularByGenreTask {
    fn kind(&self) -> TaskKind {
        TaskKind::PopularByGenre
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let genres = self.ctx.backlog.genres_missing_popular(limit).await?;
        let scopes = genres.into_iter().map(PopularScope::Genre).collect();
        ingest_popular(&self.ctx, scopes).await
    }
}

async fn ingest_popular(ctx: &TaskContext, scopes: Vec<PopularScope>) -> Result<u64> {
    if scopes.is_empty() {
        return Ok(0);
    }

    let mut synced = 0u64;
    for scope in scopes {
        let fetched = ctx
            .backoff
            .run(&format!("popular listing {scope:?}"), || {
                ctx.catalog.popular(scope, 1)
            })
            .await?;
        match fetched {
            Some(listing) => {
                let entries = listing
                    .into_iter()
                    .enumerate()
                    .map(|(idx, summary)| PopularEntry {
                        scope,
                        rank: idx as u32 + 1,
                        external_movie_id: summary.external_id,
                        title: summary.title,
                    })
                    .collect();
                ctx.backlog.upsert_popular_entries(scope, entries).await?;
                synced += 1;
            }
            None => {
                tracing::warn!(?scope, "no popular listing for scope, marking unsyncable");
                ctx.backlog.mark_popular_unsyncable(scope).await?;
            }
        }
    }
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backlog::{BacklogStore, MemoryBacklog};
    use crate::sources::CatalogMovieSummary;
    use crate::tasks::test_support::{FakeCatalog, fast_backoff};

    #[tokio::test]
    async fn ingests_one_index_per_seeded_year() {
        let backlog = MemoryBacklog::new();
        backlog.seed_missing_popular(PopularScope::Year(1999)).await;
        backlog.seed_missing_popular(PopularScope::Genre(27)).await;

        let mut catalog = FakeCatalog::default();
        catalog.popular.insert(
            PopularScope::Year(1999),
            vec![
                CatalogMovieSummary {
                    external_id: 603,
                    title: "The Matrix".to_string(),
                    release_year: Some(1999),
                },
                CatalogMovieSummary {
                    external_id: 550,
                    title: "Fight Club".to_string(),
                    release_year: Some(1999),
                },
            ],
        );

        let task = PopularByYearTask::new(TaskContext::new(
            Arc::new(backlog.clone()),
            Arc::new(catalog),
            fast_backoff(),
        ));

        // The genre scope is not this task's backlog.
        assert_eq!(task.execute(10).await.unwrap(), 1);

        let entries = backlog.popular_for(PopularScope::Year(1999)).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].external_movie_id, 603);

        // Drained: the next execution has nothing to do.
        assert_eq!(task.execute(10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn absent_listing_marks_the_scope_unsyncable() {
        let backlog = MemoryBacklog::new();
        backlog.seed_missing_popular(PopularScope::Genre(99)).await;

        let task = PopularByGenreTask::new(TaskContext::new(
            Arc::new(backlog.clone()),
            Arc::new(FakeCatalog::default()),
            fast_backoff(),
        ));

        assert_eq!(task.execute(10).await.unwrap(), 0);
        // Flagged, so it is no longer offered as backlog.
        assert_eq!(task.execute(10).await.unwrap(), 0);
        assert!(
            backlog
                .genres_missing_popular(10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
