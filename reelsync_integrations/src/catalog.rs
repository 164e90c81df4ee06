//! Metadata-catalog client.
//!
//! Lookups return the catalog's JSON resources mapped into the engine's
//! record shapes. An HTTP 404 maps to `Error::NotFound`, the classification
//! the backoff executor refuses to retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use reelsync_core::sources::{
    CatalogCastCredit, CatalogClient, CatalogCollection, CatalogCredits, CatalogCrewCredit,
    CatalogMovie, CatalogMovieSummary, CatalogPerson, PopularScope,
};
use reelsync_core::{Error, Result};

#[derive(Debug, Deserialize)]
struct ApiCollectionRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiGenreRef {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct ApiMovie {
    id: i64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    belongs_to_collection: Option<ApiCollectionRef>,
    #[serde(default)]
    genres: Vec<ApiGenreRef>,
}

#[derive(Debug, Deserialize)]
struct ApiCastCredit {
    id: i64,
    name: String,
    #[serde(default)]
    character: Option<String>,
    #[serde(default)]
    order: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiCrewCredit {
    id: i64,
    name: String,
    department: String,
    job: String,
}

#[derive(Debug, Deserialize)]
struct ApiCredits {
    #[serde(default)]
    cast: Vec<ApiCastCredit>,
    #[serde(default)]
    crew: Vec<ApiCrewCredit>,
}

#[derive(Debug, Deserialize)]
struct ApiPerson {
    id: i64,
    name: String,
    #[serde(default)]
    known_for_department: Option<String>,
    #[serde(default)]
    birthday: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCollectionPart {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiCollection {
    id: i64,
    name: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    parts: Vec<ApiCollectionPart>,
}

#[derive(Debug, Deserialize)]
struct ApiDiscoverEntry {
    id: i64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDiscoverPage {
    #[serde(default)]
    results: Vec<ApiDiscoverEntry>,
}

#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    api_base: String,
    api_key: String,
}

impl HttpCatalogClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");

        Self {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("reelsync"));
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", self.api_key);
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| Error::backend("invalid catalog auth header", e))?,
        );
        Ok(h)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .map_err(Error::backend_reqwest)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("catalog resource {path}")));
        }
        let resp = resp.error_for_status().map_err(Error::backend_reqwest)?;
        resp.json().await.map_err(Error::backend_reqwest)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    #[instrument(level = "debug", skip(self))]
    async fn movie(&self, external_id: i64) -> Result<CatalogMovie> {
        let api: ApiMovie = self.get_json(&format!("/movie/{external_id}"), &[]).await?;
        Ok(into_movie(api))
    }

    #[instrument(level = "debug", skip(self))]
    async fn movie_credits(&self, external_id: i64) -> Result<CatalogCredits> {
        let api: ApiCredits = self
            .get_json(&format!("/movie/{external_id}/credits"), &[])
            .await?;
        Ok(into_credits(api))
    }

    #[instrument(level = "debug", skip(self))]
    async fn person(&self, external_id: i64) -> Result<CatalogPerson> {
        let api: ApiPerson = self.get_json(&format!("/person/{external_id}"), &[]).await?;
        Ok(into_person(api))
    }

    #[instrument(level = "debug", skip(self))]
    async fn collection(&self, external_id: i64) -> Result<CatalogCollection> {
        let api: ApiCollection = self
            .get_json(&format!("/collection/{external_id}"), &[])
            .await?;
        Ok(into_collection(api))
    }

    #[instrument(level = "debug", skip(self))]
    async fn popular(&self, scope: PopularScope, page: u32) -> Result<Vec<CatalogMovieSummary>> {
        let mut query = vec![
            ("sort_by", "popularity.desc".to_string()),
            ("page", page.to_string()),
        ];
        match scope {
            PopularScope::Year(year) => query.push(("primary_release_year", year.to_string())),
            PopularScope::Genre(genre) => query.push(("with_genres", genre.to_string())),
        }

        let api: ApiDiscoverPage = self.get_json("/discover/movie", &query).await?;
        Ok(api
            .results
            .into_iter()
            .map(|entry| CatalogMovieSummary {
                external_id: entry.id,
                title: entry.title,
                release_year: release_year(entry.release_date.as_deref()),
            })
            .collect())
    }
}

fn release_year(release_date: Option<&str>) -> Option<i32> {
    let date = release_date?.trim();
    if date.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| chrono::Datelike::year(&d))
}

fn into_movie(api: ApiMovie) -> CatalogMovie {
    CatalogMovie {
        external_id: api.id,
        title: api.title,
        release_year: release_year(api.release_date.as_deref()),
        runtime_minutes: api.runtime,
        overview: api.overview.filter(|s| !s.trim().is_empty()),
        collection_external_id: api.belongs_to_collection.map(|c| c.id),
        genre_ids: api.genres.into_iter().map(|g| g.id).collect(),
    }
}

fn into_credits(api: ApiCredits) -> CatalogCredits {
    CatalogCredits {
        cast: api
            .cast
            .into_iter()
            .map(|c| CatalogCastCredit {
                person_external_id: c.id,
                name: c.name,
                character: c.character.filter(|s| !s.trim().is_empty()),
                billing_order: c.order,
            })
            .collect(),
        crew: api
            .crew
            .into_iter()
            .map(|c| CatalogCrewCredit {
                person_external_id: c.id,
                name: c.name,
                department: c.department,
                job: c.job,
            })
            .collect(),
    }
}

fn into_person(api: ApiPerson) -> CatalogPerson {
    let birthday = api
        .birthday
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    CatalogPerson {
        external_id: api.id,
        name: api.name,
        known_for_department: api.known_for_department.filter(|s| !s.trim().is_empty()),
        birthday,
    }
}

fn into_collection(api: ApiCollection) -> CatalogCollection {
    CatalogCollection {
        external_id: api.id,
        name: api.name,
        overview: api.overview.filter(|s| !s.trim().is_empty()),
        part_external_ids: api.parts.into_iter().map(|p| p.id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_the_movie_resource() {
        let api: ApiMovie = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "release_date": "1999-03-30",
            "runtime": 136,
            "overview": "A hacker learns the truth.",
            "belongs_to_collection": { "id": 2344, "name": "The Matrix Collection" },
            "genres": [{ "id": 28, "name": "Action" }, { "id": 878, "name": "Science Fiction" }]
        }))
        .unwrap();

        let movie = into_movie(api);
        assert_eq!(movie.external_id, 603);
        assert_eq!(movie.release_year, Some(1999));
        assert_eq!(movie.collection_external_id, Some(2344));
        assert_eq!(movie.genre_ids, vec![28, 878]);
    }

    #[test]
    fn missing_optional_fields_deserialize_as_none() {
        let api: ApiMovie = serde_json::from_value(serde_json::json!({
            "id": 550,
            "title": "Fight Club"
        }))
        .unwrap();

        let movie = into_movie(api);
        assert_eq!(movie.release_year, None);
        assert_eq!(movie.collection_external_id, None);
        assert!(movie.genre_ids.is_empty());
    }

    #[test]
    fn blank_release_date_yields_no_year() {
        assert_eq!(release_year(Some("")), None);
        assert_eq!(release_year(Some("not-a-date")), None);
        assert_eq!(release_year(Some("2003-11-05")), Some(2003));
        assert_eq!(release_year(None), None);
    }

    #[test]
    fn maps_cast_and_crew_credits() {
        let api: ApiCredits = serde_json::from_value(serde_json::json!({
            "cast": [{ "id": 6384, "name": "Keanu Reeves", "character": "Neo", "order": 0 }],
            "crew": [{ "id": 9339, "name": "Lana Wachowski", "department": "Directing", "job": "Director" }]
        }))
        .unwrap();

        let credits = into_credits(api);
        assert_eq!(credits.cast.len(), 1);
        assert_eq!(credits.cast[0].billing_order, Some(0));
        assert_eq!(credits.crew[0].job, "Director");
    }

    #[test]
    fn person_birthday_parses_when_present() {
        let api: ApiPerson = serde_json::from_value(serde_json::json!({
            "id": 6384,
            "name": "Keanu Reeves",
            "known_for_department": "Acting",
            "birthday": "1964-09-02"
        }))
        .unwrap();

        let person = into_person(api);
        assert_eq!(
            person.birthday,
            NaiveDate::from_ymd_opt(1964, 9, 2)
        );
    }
}
