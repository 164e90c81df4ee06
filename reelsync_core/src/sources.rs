//! Client interfaces for the two external sources.
//!
//! Implementations live in `reelsync_integrations` or test code. A record the
//! source definitively reports absent must surface as `Error::NotFound`; that
//! classification is what lets the backoff executor stop retrying and callers
//! mark the backlog item unsyncable.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Popular-index partition: a release year or a catalog genre.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopularScope {
    Year(i32),
    Genre(i32),
}

/// A movie as the metadata catalog returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMovie {
    pub external_id: i64,
    pub title: String,
    pub release_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub overview: Option<String>,
    pub collection_external_id: Option<i64>,
    pub genre_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCastCredit {
    pub person_external_id: i64,
    pub name: String,
    pub character: Option<String>,
    pub billing_order: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCrewCredit {
    pub person_external_id: i64,
    pub name: String,
    pub department: String,
    pub job: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogCredits {
    pub cast: Vec<CatalogCastCredit>,
    pub crew: Vec<CatalogCrewCredit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPerson {
    pub external_id: i64,
    pub name: String,
    pub known_for_department: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCollection {
    pub external_id: i64,
    pub name: String,
    pub overview: Option<String>,
    pub part_external_ids: Vec<i64>,
}

/// One row of a popular-index listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMovieSummary {
    pub external_id: i64,
    pub title: String,
    pub release_year: Option<i32>,
}

/// Lookup client for the third-party metadata catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn movie(&self, external_id: i64) -> Result<CatalogMovie>;

    async fn movie_credits(&self, external_id: i64) -> Result<CatalogCredits>;

    async fn person(&self, external_id: i64) -> Result<CatalogPerson>;

    async fn collection(&self, external_id: i64) -> Result<CatalogCollection>;

    /// The popular listing for a year or genre, one page at a time.
    async fn popular(&self, scope: PopularScope, page: u32) -> Result<Vec<CatalogMovieSummary>>;
}

/// Which per-account listing a harvest walk reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Watches,
    Ratings,
}

/// Direction of a harvest walk.
///
/// `Asc` is the forward catch-up: listing pages are newest-first, so the walk
/// can stop at the first already-known record. `Desc` is the full backfill
/// from the last page down, which never short-circuits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOrder {
    Asc,
    Desc,
}

/// A resolved tracking-site account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub username: String,
    /// The site's canonical account slug, used in listing URLs.
    pub slug: String,
}

/// One raw entry as scraped from a listing page, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedEntry {
    /// Catalog id embedded in the page; absent when the scrape found none.
    pub external_movie_id: Option<i64>,
    pub display_name: String,
    /// The film's slug on the tracking site.
    pub source_slug: String,
    pub star_rating: Option<f32>,
    pub recorded_at: Option<NaiveDate>,
}

/// Paginated listing client for the scraped tracking site. Page numbers are
/// 1-based; page 1 is the newest.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn resolve_account(&self, username: &str) -> Result<AccountRef>;

    /// Index of the last available page for a listing (0 when empty).
    async fn last_page(&self, account: &AccountRef, kind: EntryKind) -> Result<u32>;

    /// Entries on one page, in source order (newest first).
    async fn list_page(
        &self,
        account: &AccountRef,
        kind: EntryKind,
        page: u32,
    ) -> Result<Vec<ScrapedEntry>>;
}
