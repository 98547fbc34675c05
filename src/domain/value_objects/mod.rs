pub mod offline;

pub use offline::{
    CacheKey, EntityKind, QueueAction, QueueItemStatus, QueuePayload, SyncQueueId,
};
