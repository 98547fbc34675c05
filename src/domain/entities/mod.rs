pub mod offline;

pub use offline::{
    CacheEntry, QueueFilter, QueueItem, QueueItemDraft, QueueItemPatch, SyncOutcome, SyncReport,
};
