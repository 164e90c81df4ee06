use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::{
    CollectionRecord, CreditRecord, EntryKey, HarvestedRecord, MovieRecord, PersonRecord,
    PopularEntry,
};
use super::traits::BacklogStore;
use crate::sources::PopularScope;
use crate::{Error, Result};

/// In-memory backlog store for local development and unit tests.
///
/// Missing-item keys are seeded explicitly; a seeded key drops out of its
/// `*_missing` query once the matching record is upserted or the key is
/// marked unsyncable, which mirrors how the relational queries behave.
#[derive(Clone, Default)]
pub struct MemoryBacklog {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    missing_popular: Vec<PopularScope>,
    missing_entry_movies: Vec<i64>,
    missing_popular_movies: Vec<i64>,
    missing_credit_movies: Vec<i64>,
    missing_cast_people: Vec<i64>,
    missing_crew_people: Vec<i64>,
    missing_collections: Vec<i64>,

    movies: HashMap<i64, MovieRecord>,
    people: HashMap<i64, PersonRecord>,
    credits: HashMap<i64, Vec<CreditRecord>>,
    collections: HashMap<i64, CollectionRecord>,
    popular: HashMap<PopularScope, Vec<PopularEntry>>,
    entries: HashMap<EntryKey, HarvestedRecord>,

    unsyncable_movies: HashSet<i64>,
    unsyncable_people: HashSet<i64>,
    unsyncable_credits: HashSet<i64>,
    unsyncable_collections: HashSet<i64>,
    unsyncable_popular: HashSet<PopularScope>,

    fail_writes: Option<String>,
}

impl MemoryBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding (tests and local development) ───────────────────

    pub async fn seed_missing_popular(&self, scope: PopularScope) {
        self.state.lock().await.missing_popular.push(scope);
    }

    pub async fn seed_missing_entry_movie(&self, external_id: i64) {
        self.state.lock().await.missing_entry_movies.push(external_id);
    }

    pub async fn seed_missing_popular_movie(&self, external_id: i64) {
        self.state
            .lock()
            .await
            .missing_popular_movies
            .push(external_id);
    }

    pub async fn seed_missing_credits(&self, movie_external_id: i64) {
        self.state
            .lock()
            .await
            .missing_credit_movies
            .push(movie_external_id);
    }

    pub async fn seed_missing_cast_person(&self, external_id: i64) {
        self.state.lock().await.missing_cast_people.push(external_id);
    }

    pub async fn seed_missing_crew_person(&self, external_id: i64) {
        self.state.lock().await.missing_crew_people.push(external_id);
    }

    pub async fn seed_missing_collection(&self, external_id: i64) {
        self.state.lock().await.missing_collections.push(external_id);
    }

    /// Make every subsequent write fail (primarily for tests).
    pub async fn fail_writes(&self, message: impl Into<String>) {
        self.state.lock().await.fail_writes = Some(message.into());
    }

    // ── Snapshots (primarily for tests) ─────────────────────────

    pub async fn movies(&self) -> Vec<MovieRecord> {
        self.state.lock().await.movies.values().cloned().collect()
    }

    pub async fn people(&self) -> Vec<PersonRecord> {
        self.state.lock().await.people.values().cloned().collect()
    }

    pub async fn credits_for(&self, movie_external_id: i64) -> Vec<CreditRecord> {
        self.state
            .lock()
            .await
            .credits
            .get(&movie_external_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn popular_for(&self, scope: PopularScope) -> Vec<PopularEntry> {
        self.state
            .lock()
            .await
            .popular
            .get(&scope)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn entries(&self) -> Vec<HarvestedRecord> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    pub async fn unsyncable_movies(&self) -> HashSet<i64> {
        self.state.lock().await.unsyncable_movies.clone()
    }

    pub async fn unsyncable_people(&self) -> HashSet<i64> {
        self.state.lock().await.unsyncable_people.clone()
    }
}

impl State {
    fn check_writable(&self) -> Result<()> {
        match &self.fail_writes {
            Some(message) => Err(Error::BackendMessage(message.clone())),
            None => Ok(()),
        }
    }
}

fn take_missing<K: Copy + Eq + std::hash::Hash>(
    seeded: &[K],
    resolved: impl Fn(&K) -> bool,
    unsyncable: &HashSet<K>,
    limit: usize,
) -> Vec<K> {
    let mut seen = HashSet::new();
    seeded
        .iter()
        .copied()
        .filter(|k| !resolved(k) && !unsyncable.contains(k) && seen.insert(*k))
        .take(limit)
        .collect()
}

#[async_trait]
impl BacklogStore for MemoryBacklog {
    async fn years_missing_popular(&self, limit: usize) -> Result<Vec<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .missing_popular
            .iter()
            .filter_map(|s| match s {
                PopularScope::Year(year) => Some((*s, *year)),
                PopularScope::Genre(_) => None,
            })
            .filter(|(scope, _)| {
                !state.popular.contains_key(scope) && !state.unsyncable_popular.contains(scope)
            })
            .map(|(_, year)| year)
            .take(limit)
            .collect())
    }

    async fn genres_missing_popular(&self, limit: usize) -> Result<Vec<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .missing_popular
            .iter()
            .filter_map(|s| match s {
                PopularScope::Genre(genre) => Some((*s, *genre)),
                PopularScope::Year(_) => None,
            })
            .filter(|(scope, _)| {
                !state.popular.contains_key(scope) && !state.unsyncable_popular.contains(scope)
            })
            .map(|(_, genre)| genre)
            .take(limit)
            .collect())
    }

    async fn entry_movies_missing(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_entry_movies,
            |id| state.movies.contains_key(id),
            &state.unsyncable_movies,
            limit,
        ))
    }

    async fn popular_movies_missing(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_popular_movies,
            |id| state.movies.contains_key(id),
            &state.unsyncable_movies,
            limit,
        ))
    }

    async fn movies_missing_credits(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_credit_movies,
            |id| state.credits.contains_key(id),
            &state.unsyncable_credits,
            limit,
        ))
    }

    async fn cast_people_missing(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_cast_people,
            |id| state.people.contains_key(id),
            &state.unsyncable_people,
            limit,
        ))
    }

    async fn crew_people_missing(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_crew_people,
            |id| state.people.contains_key(id),
            &state.unsyncable_people,
            limit,
        ))
    }

    async fn collections_missing(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(take_missing(
            &state.missing_collections,
            |id| state.collections.contains_key(id),
            &state.unsyncable_collections,
            limit,
        ))
    }

    async fn upsert_movie(&self, movie: MovieRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.movies.insert(movie.external_id, movie);
        Ok(())
    }

    async fn upsert_person(&self, person: PersonRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.people.insert(person.external_id, person);
        Ok(())
    }

    async fn upsert_credits(
        &self,
        movie_external_id: i64,
        credits: Vec<CreditRecord>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.credits.insert(movie_external_id, credits);
        Ok(())
    }

    async fn upsert_collection(&self, collection: CollectionRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.collections.insert(collection.external_id, collection);
        Ok(())
    }

    async fn upsert_popular_entries(
        &self,
        scope: PopularScope,
        entries: Vec<PopularEntry>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.popular.insert(scope, entries);
        Ok(())
    }

    async fn mark_movie_unsyncable(&self, external_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.unsyncable_movies.insert(external_id);
        Ok(())
    }

    async fn mark_person_unsyncable(&self, external_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.unsyncable_people.insert(external_id);
        Ok(())
    }

    async fn mark_credits_unsyncable(&self, movie_external_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.unsyncable_credits.insert(movie_external_id);
        Ok(())
    }

    async fn mark_collection_unsyncable(&self, external_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.unsyncable_collections.insert(external_id);
        Ok(())
    }

    async fn mark_popular_unsyncable(&self, scope: PopularScope) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.unsyncable_popular.insert(scope);
        Ok(())
    }

    async fn find_entry(&self, key: &EntryKey) -> Result<Option<HarvestedRecord>> {
        let state = self.state.lock().await;
        Ok(state.entries.get(key).cloned())
    }

    async fn insert_entry(&self, entry: HarvestedRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.entries.insert(entry.natural_key(), entry);
        Ok(())
    }
}
