//! Resolve movie records referenced elsewhere but missing locally.

use async_trait::async_trait;

use super::{SyncTask, TaskContext};
use crate::Result;
use crate::backlog::MovieRecord;
use crate::ledger::TaskKind;
use crate::sources::CatalogMovie;

/// Movies referenced by harvested viewing entries.
pub struct EntryMoviesTask {
    ctx: TaskContext,
}

impl EntryMoviesTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for EntryMoviesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::EntryMovies
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let ids = self.ctx.backlog.entry_movies_missing(limit).await?;
        resolve_movies(&self.ctx, ids).await
    }
}

/// Movies referenced by popular-index rows.
pub struct PopularMoviesTask {
    ctx: TaskContext,
}

impl PopularMoviesTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for PopularMoviesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::PopularMovies
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let ids = self.ctx.backlog.popular_movies_missing(limit).await?;
        resolve_movies(&self.ctx, ids).await
    }
}

async fn resolve_movies(ctx: &TaskContext, ids: Vec<i64>) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut synced = 0u64;
    for id in ids {
        let fetched = ctx
            .backoff
            .run(&format!("movie {id}"), || ctx.catalog.movie(id))
            .await?;
        match fetched {
            Some(movie) => {
                ctx.backlog.upsert_movie(movie_record(movie)).await?;
                synced += 1;
            }
            None => {
                tracing::warn!(movie_id = id, "movie absent from catalog, marking unsyncable");
                ctx.backlog.mark_movie_unsyncable(id).await?;
            }
        }
    }
    Ok(synced)
}

fn movie_record(movie: CatalogMovie) -> MovieRecord {
    MovieRecord {
        external_id: movie.external_id,
        title: movie.title,
        release_year: movie.release_year,
        runtime_minutes: movie.runtime_minutes,
        overview: movie.overview,
        collection_external_id: movie.collection_external_id,
        genre_ids: movie.genre_ids,
    }
}
