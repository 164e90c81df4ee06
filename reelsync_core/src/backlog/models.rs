use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sources::{EntryKind, PopularScope};

/// A movie record as the engine upserts it into the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub external_id: i64,
    pub title: String,
    pub release_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub overview: Option<String>,
    pub collection_external_id: Option<i64>,
    pub genre_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub external_id: i64,
    pub name: String,
    pub known_for_department: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum CreditRole {
    Cast {
        character: Option<String>,
        billing_order: Option<u32>,
    },
    Crew {
        department: String,
        job: String,
    },
}

/// One cast or crew row for a movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRecord {
    pub movie_external_id: i64,
    pub person_external_id: i64,
    pub person_name: String,
    pub role: CreditRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub external_id: i64,
    pub name: String,
    pub overview: Option<String>,
    pub part_external_ids: Vec<i64>,
}

/// One row of a popular index for a year or genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularEntry {
    pub scope: PopularScope,
    pub rank: u32,
    pub external_movie_id: i64,
    pub title: String,
}

/// A watch or rating entry harvested for a user. Persisted one record at a
/// time so progress already made survives a later failure in the same run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedRecord {
    pub username: String,
    pub kind: EntryKind,
    pub external_movie_id: i64,
    pub display_name: String,
    /// The film's slug on the tracking site.
    pub source_slug: String,
    pub star_rating: Option<f32>,
    pub recorded_at: Option<NaiveDate>,
}

impl HarvestedRecord {
    pub fn natural_key(&self) -> EntryKey {
        EntryKey {
            username: self.username.clone(),
            kind: self.kind,
            external_movie_id: self.external_movie_id,
            source_slug: self.source_slug.clone(),
            recorded_at: self.recorded_at,
            star_half: self.star_rating.map(half_stars),
        }
    }
}

/// Natural key of a harvested entry: user + movie + source slug, plus date
/// and star value where the entry carries them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub username: String,
    pub kind: EntryKind,
    pub external_movie_id: i64,
    pub source_slug: String,
    pub recorded_at: Option<NaiveDate>,
    /// Star value in half-star units, so the key stays hashable.
    pub star_half: Option<u8>,
}

pub(crate) fn half_stars(rating: f32) -> u8 {
    (rating * 2.0).round() as u8
}
