//! reelsync core: the synchronization engine that keeps a local store of
//! movies, people, and per-user viewing history eventually complete.
//!
//! The engine is a library invoked in-process: an external trigger (HTTP
//! handler, periodic job) calls [`SyncService`], which brackets every attempt
//! with a durable [`ledger`] entry, drains one backlog category per system
//! run through the [`orchestrator`], and walks a user's scraped listings
//! through the [`harvester`]. Relational storage for the entities themselves
//! sits behind the [`backlog`] traits and is collaborator-owned.

pub mod backlog;
pub mod backoff;
pub mod config;
pub mod error;
pub mod harvester;
pub mod ledger;
pub mod orchestrator;
pub mod service;
pub mod sources;
pub mod tasks;

pub use backlog::{
    BacklogStore, CollectionRecord, CreditRecord, CreditRole, EntryKey, HarvestedRecord,
    MemoryBacklog, MovieRecord, PersonRecord, PopularEntry,
};
pub use backoff::Backoff;
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use harvester::{HarvestError, HarvestReport, UserHarvester};
pub use ledger::{
    MemoryLedger, QueuedSync, SqliteLedger, SyncCompletion, SyncLedger, SyncRun, SyncRunQuery,
    SyncStatus, SyncTrigger, TaskKind,
};
pub use orchestrator::{RunOptions, RunOutcome, SyncOrchestrator};
pub use service::{HarvestOutcome, SyncService};
pub use sources::{
    AccountRef, CatalogCastCredit, CatalogClient, CatalogCollection, CatalogCredits,
    CatalogCrewCredit, CatalogMovie, CatalogMovieSummary, CatalogPerson, EntryKind, PopularScope,
    ScrapedEntry, TrackerClient, WalkOrder,
};
pub use tasks::{SyncTask, TaskContext, default_tasks};
