//! Resolve cast and crew rows for movies that have none yet.

use async_trait::async_trait;

use super::{SyncTask, TaskContext};
use crate::Result;
use crate::backlog::{CreditRecord, CreditRole};
use crate::ledger::TaskKind;
use crate::sources::CatalogCredits;

pub struct MovieCreditsTask {
    ctx: TaskContext,
}

impl MovieCreditsTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SyncTask for MovieCreditsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::MovieCredits
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn execute(&self, limit: usize) -> Result<u64> {
        let movie_ids = self.ctx.backlog.movies_missing_credits(limit).await?;
        if movie_ids.is_empty() {
            return Ok(0);
        }

        let mut synced = 0u64;
        for movie_id in movie_ids {
            let fetched = self
                .ctx
                .backoff
                .run(&format!("credits for movie {movie_id}"), || {
                    self.ctx.catalog.movie_credits(movie_id)
                })
                .await?;
            match fetched {
                Some(credits) => {
                    self.ctx
                        .backlog
                        .upsert_credits(movie_id, credit_records(movie_id, credits))
                        .await?;
                    synced += 1;
                }
                None => {
                    tracing::warn!(movie_id, "credits absent from catalog, marking unsyncable");
                    self.ctx.backlog.mark_credits_unsyncable(movie_id).await?;
                }
            }
        }
        Ok(synced)
    }
}

fn credit_records(movie_external_id: i64, credits: CatalogCredits) -> Vec<CreditRecord> {
    let mut records = Vec::with_capacity(credits.cast.len() + credits.crew.len());
    for cast in credits.cast {
        records.push(CreditRecord {
            movie_external_id,
            person_external_id: cast.person_external_id,
            person_name: cast.name,
            role: CreditRole::Cast {
                character: cast.character,
                billing_order: cast.billing_order,
            },
        });
    }
    for crew in credits.crew {
        records.push(CreditRecord {
            movie_external_id,
            person_external_id: crew.person_external_id,
            person_name: crew.name,
            role: CreditRole::Crew {
                department: crew.department,
                job: crew.job,
            },
        });
    }
    records
}
