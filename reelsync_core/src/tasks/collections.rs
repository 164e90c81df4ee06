//! Resolve collection records referenced by movies.

use async_trait::async_trait;

use super::{SyncTask, TaskContext};
use crate::Result;
use crate::backlog::CollectionRecord;
use crate::ledger::TaskKind;
use crate::sources::CatalogCollection;

pub struct MovieCollectionsTask {
    ctx: TaskContext,
}

impl MovieCollectionsTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for MovieCollectionsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::MovieCollections
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let ids = self.ctx.backlog.collections_missing(limit).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut synced = 0u64;
        for id in ids {
            let fetched = self
                .ctx
                .backoff
                .run(&format!("collection {id}"), || self.ctx.catalog.collection(id))
                .await?;
            match fetched {
                Some(collection) => {
                    self.ctx
                        .backlog
                        .upsert_collection(collection_record(collection))
                        .await?;
                    synced += 1;
                }
                None => {
                    tracing::warn!(
                        collection_id = id,
                        "collection absent from catalog, marking unsyncable"
                    );
                    self.ctx.backlog.mark_collection_unsyncable(id).await?;
                }
            }
        }
        Ok(synced)
    }
}

fn collection_record(collection: CatalogCollection) -> CollectionRecord {
    CollectionRecord {
        external_id: collection.external_id,
        name: collection.name,
        overview: collection.overview,
        part_external_ids: collection.part_external_ids,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backlog::MemoryBacklog;
    use crate::tasks::test_support::{FakeCatalog, fast_backoff};

    #[tokio::test]
    async fn resolves_seeded_collections() {
        let backlog = MemoryBacklog::new();
        backlog.seed_missing_collection(2344).await;

        let mut catalog = FakeCatalog::default();
        catalog.collections.insert(
            2344,
            CatalogCollection {
                external_id: 2344,
                name: "The Matrix Collection".to_string(),
                overview: None,
                part_external_ids: vec![603, 604, 605],
            },
        );

        let task = MovieCollectionsTask::new(TaskContext::new(
            Arc::new(backlog.clone()),
            Arc::new(catalog),
            fast_backoff(),
        ));

        assert_eq!(task.execute(10).await.unwrap(), 1);
        assert_eq!(task.execute(10).await.unwrap(), 0);
    }
}
