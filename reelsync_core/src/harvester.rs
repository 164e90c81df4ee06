//! Per-user incremental harvester for the scraped tracking site.
//!
//! Listing pages are newest-first, which is what makes the forward catch-up
//! walk correct: the first already-known record proves everything after it on
//! that page, and every later page, is already stored. Records are persisted
//! one at a time, never batched, so a failure partway through a walk leaves
//! everything before it committed.

use std::sync::Arc;

use crate::backlog::{BacklogStore, HarvestedRecord};
use crate::sources::{AccountRef, EntryKind, ScrapedEntry, TrackerClient, WalkOrder};
use crate::{Error, Result};

/// A harvest failure carrying the records committed before it.
///
/// Callers must handle the partial data explicitly: the records in `synced`
/// are already in the store and are reported on the ledger even though the
/// run itself failed.
#[derive(Debug, thiserror::Error)]
#[error("harvest for '{username}' failed after {} synced records: {cause}", .synced.len())]
pub struct HarvestError {
    pub username: String,
    pub synced: Vec<HarvestedRecord>,
    #[source]
    pub cause: Error,
}

/// Everything one harvest invocation pulled in, across both walks.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub username: String,
    pub synced: Vec<HarvestedRecord>,
}

#[derive(Debug, Default)]
struct PageOutcome {
    new_records: u64,
    found_known: bool,
}

pub struct UserHarvester {
    tracker: Arc<dyn TrackerClient>,
    backlog: Arc<dyn BacklogStore>,
}

impl UserHarvester {
    pub fn new(tracker: Arc<dyn TrackerClient>, backlog: Arc<dyn BacklogStore>) -> Self {
        Self { tracker, backlog }
    }

    /// Walk the user's watch and rating listings. The two walks are
    /// independent: records committed by the first survive a failure in the
    /// second, and both contribute to the error's partial collection.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn harvest_user(
        &self,
        username: &str,
        order: WalkOrder,
    ) -> std::result::Result<HarvestReport, HarvestError> {
        let mut synced = Vec::new();
        match self.harvest_inner(username, order, &mut synced).await {
            Ok(()) => {
                tracing::info!(username, count = synced.len(), "harvest complete");
                Ok(HarvestReport {
                    username: username.to_string(),
                    synced,
                })
            }
            Err(cause) => {
                tracing::warn!(username, partial = synced.len(), %cause, "harvest failed");
                Err(HarvestError {
                    username: username.to_string(),
                    synced,
                    cause,
                })
            }
        }
    }

    async fn harvest_inner(
        &self,
        username: &str,
        order: WalkOrder,
        synced: &mut Vec<HarvestedRecord>,
    ) -> Result<()> {
        if username.trim().is_empty() {
            return Err(Error::InvalidInput("username is empty".to_string()));
        }

        let account = self.tracker.resolve_account(username).await?;
        self.walk(&account, EntryKind::Watches, order, synced).await?;
        self.walk(&account, EntryKind::Ratings, order, synced).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, synced))]
    async fn walk(
        &self,
        account: &AccountRef,
        kind: EntryKind,
        order: WalkOrder,
        synced: &mut Vec<HarvestedRecord>,
    ) -> Result<()> {
        let last = self.tracker.last_page(account, kind).await?;
        if last == 0 {
            return Ok(());
        }

        match order {
            WalkOrder::Asc => {
                for page in 1..=last {
                    let outcome = self.ingest_page(account, kind, page, order, synced).await?;
                    // A known record, or a page with nothing new, means the
                    // remainder is already stored.
                    if outcome.found_known || outcome.new_records == 0 {
                        break;
                    }
                }
            }
            WalkOrder::Desc => {
                for page in (1..=last).rev() {
                    self.ingest_page(account, kind, page, order, synced).await?;
                }
            }
        }
        Ok(())
    }

    async fn ingest_page(
        &self,
        account: &AccountRef,
        kind: EntryKind,
        page: u32,
        order: WalkOrder,
        synced: &mut Vec<HarvestedRecord>,
    ) -> Result<PageOutcome> {
        let entries = self.tracker.list_page(account, kind, page).await?;
        let mut outcome = PageOutcome::default();

        for raw in entries {
            let record = validate_entry(&account.username, kind, raw)?;
            if self.backlog.find_entry(&record.natural_key()).await?.is_some() {
                match order {
                    WalkOrder::Asc => {
                        outcome.found_known = true;
                        break;
                    }
                    // Backfill never short-circuits; it only avoids re-inserting.
                    WalkOrder::Desc => continue,
                }
            }

            self.backlog.insert_entry(record.clone()).await?;
            synced.push(record);
            outcome.new_records += 1;
        }
        Ok(outcome)
    }
}

fn validate_entry(username: &str, kind: EntryKind, raw: ScrapedEntry) -> Result<HarvestedRecord> {
    let external_movie_id = raw.external_movie_id.ok_or_else(|| {
        Error::InvalidRecord(format!(
            "entry '{}' carries no numeric catalog id",
            raw.display_name
        ))
    })?;
    if raw.display_name.trim().is_empty() {
        return Err(Error::InvalidRecord(format!(
            "entry {external_movie_id} has an empty display name"
        )));
    }

    let (star_rating, recorded_at) = match kind {
        EntryKind::Watches => (raw.star_rating, raw.recorded_at),
        EntryKind::Ratings => {
            let star = raw.star_rating.ok_or_else(|| {
                Error::InvalidRecord(format!("rating entry {external_movie_id} has no star value"))
            })?;
            if !(0.0..=5.0).contains(&star) {
                return Err(Error::InvalidRecord(format!(
                    "rating entry {external_movie_id} has star value {star} out of range"
                )));
            }
            let date = raw.recorded_at.ok_or_else(|| {
                Error::InvalidRecord(format!("rating entry {external_movie_id} has no date"))
            })?;
            (Some(star), Some(date))
        }
    };

    Ok(HarvestedRecord {
        username: username.to_string(),
        kind,
        external_movie_id,
        display_name: raw.display_name,
        source_slug: raw.source_slug,
        star_rating,
        recorded_at,
    })
}
