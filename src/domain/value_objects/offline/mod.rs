pub mod cache_key;
pub mod entity_kind;
pub mod payload;
pub mod queue_action;
pub mod queue_item_status;
pub mod sync_queue_id;

pub use cache_key::CacheKey;
pub use entity_kind::EntityKind;
pub use payload::QueuePayload;
pub use queue_action::QueueAction;
pub use queue_item_status::QueueItemStatus;
pub use sync_queue_id::SyncQueueId;
