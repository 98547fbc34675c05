pub mod cache_service;
pub mod connectivity_watcher;
pub mod photo_upload;
pub mod queue_service;
pub mod sync;

pub use cache_service::CacheService;
pub use connectivity_watcher::ConnectivityWatcher;
pub use photo_upload::{DecodedImage, PhotoUploader, PreparedImage};
pub use queue_service::{QueueService, QueueServiceTrait};
pub use sync::{SyncEngine, SyncEngineConfig};
