use async_trait::async_trait;

use super::models::{
    CollectionRecord, CreditRecord, EntryKey, HarvestedRecord, MovieRecord, PersonRecord,
    PopularEntry,
};
use crate::Result;
use crate::sources::PopularScope;

/// Store facade the task executors and the harvester work through.
///
/// The relational schema behind it is collaborator-owned; the engine only
/// depends on these queries. Each `*_missing` query returns the minimal keys
/// for up to `limit` unresolved items of one backlog kind, excluding items
/// previously marked unsyncable. Zero results is the common "nothing to do"
/// answer the orchestrator falls through on.
#[async_trait]
pub trait BacklogStore: Send + Sync {
    // Discovery, one query per task kind.
    async fn years_missing_popular(&self, limit: usize) -> Result<Vec<i32>>;
    async fn genres_missing_popular(&self, limit: usize) -> Result<Vec<i32>>;
    /// External movie ids referenced by harvested entries with no movie record.
    async fn entry_movies_missing(&self, limit: usize) -> Result<Vec<i64>>;
    /// External movie ids referenced by popular-index rows with no movie record.
    async fn popular_movies_missing(&self, limit: usize) -> Result<Vec<i64>>;
    async fn movies_missing_credits(&self, limit: usize) -> Result<Vec<i64>>;
    /// People referenced by cast rows with no person record.
    async fn cast_people_missing(&self, limit: usize) -> Result<Vec<i64>>;
    /// People referenced by crew rows with no person record.
    async fn crew_people_missing(&self, limit: usize) -> Result<Vec<i64>>;
    /// Collections referenced by movies with no collection record.
    async fn collections_missing(&self, limit: usize) -> Result<Vec<i64>>;

    // Upserts for resolved records.
    async fn upsert_movie(&self, movie: MovieRecord) -> Result<()>;
    async fn upsert_person(&self, person: PersonRecord) -> Result<()>;
    async fn upsert_credits(&self, movie_external_id: i64, credits: Vec<CreditRecord>)
    -> Result<()>;
    async fn upsert_collection(&self, collection: CollectionRecord) -> Result<()>;
    async fn upsert_popular_entries(
        &self,
        scope: PopularScope,
        entries: Vec<PopularEntry>,
    ) -> Result<()>;

    // Permanently-unresolvable flags; flagged items drop out of the
    // corresponding `*_missing` query.
    async fn mark_movie_unsyncable(&self, external_id: i64) -> Result<()>;
    async fn mark_person_unsyncable(&self, external_id: i64) -> Result<()>;
    async fn mark_credits_unsyncable(&self, movie_external_id: i64) -> Result<()>;
    async fn mark_collection_unsyncable(&self, external_id: i64) -> Result<()>;
    async fn mark_popular_unsyncable(&self, scope: PopularScope) -> Result<()>;

    // Harvested viewing entries.
    async fn find_entry(&self, key: &EntryKey) -> Result<Option<HarvestedRecord>>;
    async fn insert_entry(&self, entry: HarvestedRecord) -> Result<()>;
}
