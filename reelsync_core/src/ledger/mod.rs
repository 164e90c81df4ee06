pub mod memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryLedger;
pub use models::{
    QueuedSync, SyncCompletion, SyncRun, SyncRunQuery, SyncStatus, SyncTrigger, TaskKind,
};
pub use sqlite::SqliteLedger;
pub use traits::SyncLedger;
