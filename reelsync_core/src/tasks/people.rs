//! Resolve person records referenced by cast and crew rows.

use async_trait::async_trait;

use super::{SyncTask, TaskContext};
use crate::Result;
use crate::backlog::PersonRecord;
use crate::ledger::TaskKind;
use crate::sources::CatalogPerson;

pub struct CastPeopleTask {
    ctx: TaskContext,
}

impl CastPeopleTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for CastPeopleTask {
    fn kind(&self) -> TaskKind {
        TaskKind::CastPeople
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let ids = self.ctx.backlog.cast_people_missing(limit).await?;
        resolve_people(&self.ctx, ids).await
    }
}

pub struct CrewPeopleTask {
    ctx: TaskContext,
}

impl CrewPeopleTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for CrewPeopleTask {
    fn kind(&self) -> TaskKind {
        TaskKind::CrewPeople
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let ids = self.ctx.backlog.crew_people_missing(limit).await?;
        resolve_people(&self.ctx, ids).await
    }
}

async fn resolve_people(ctx: &TaskContext, ids: Vec<i64>) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut synced = 0u64;
    for id in ids {
        let fetched = ctx
            .backoff
            .run(&format!("person {id}"), || ctx.catalog.person(id))
            .await?;
        match fetched {
            Some(person) => {
                ctx.backlog.upsert_person(person_record(person)).await?;
                synced += 1;
            }
            None => {
                tracing::warn!(person_id = id, "person absent from catalog, marking unsyncable");
                ctx.backlog.mark_person_unsyncable(id).await?;
            }
        }
    }
    Ok(synced)
}

fn person_record(person: CatalogPerson) -> PersonRecord {
    PersonRecord {
        external_id: person.external_id,
        name: person.name,
        known_for_department: person.known_for_department,
        birthday: person.birthday,
    }
}
