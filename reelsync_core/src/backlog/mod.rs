pub mod memory;
pub mod models;
pub mod traits;

pub use memory::MemoryBacklog;
pub use models::{
    CollectionRecord, CreditRecord, CreditRole, EntryKey, HarvestedRecord, MovieRecord,
    PersonRecord, PopularEntry,
};
pub use traits::BacklogStore;
