pub mod engine;
pub mod entity_handler;
pub mod failure;
pub mod handler;
pub mod merchant_handler;
pub mod metrics;

#[cfg(test)]
pub(crate) mod mocks;

pub use engine::{SyncEngine, SyncEngineConfig};
pub use entity_handler::RemoteEntityHandler;
pub use failure::SyncFailure;
pub use handler::{ApplyOutcome, HandlerRegistry, HandlerRegistryBuilder, SyncHandler};
pub use merchant_handler::MerchantHandler;
pub use metrics::{OfflineSyncMetrics, OfflineSyncMetricsSnapshot, PassTrigger};
