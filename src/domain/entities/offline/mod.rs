pub mod cache_entry;
pub mod queue_item;
pub mod sync_report;

pub use cache_entry::CacheEntry;
pub use queue_item::{QueueFilter, QueueItem, QueueItemDraft, QueueItemPatch};
pub use sync_report::{SyncOutcome, SyncReport};
