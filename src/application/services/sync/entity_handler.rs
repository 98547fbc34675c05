use super::handler::{ApplyOutcome, SyncHandler};
use crate::application::ports::remote_backend::RemoteWriteApi;
use crate::domain::entities::offline::QueueItem;
use crate::domain::value_objects::offline::QueueAction;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

/// Generic create/update/delete on the collection named by the item's kind.
pub struct RemoteEntityHandler {
    api: Arc<dyn RemoteWriteApi>,
}

impl RemoteEntityHandler {
    pub fn new(api: Arc<dyn RemoteWriteApi>) -> Self {
        Self { api }
    }
}

pub(super) fn require_record_id(item: &QueueItem) -> Result<String, AppError> {
    item.payload.record_id().ok_or_else(|| {
        AppError::ValidationError(format!(
            "{} {} requires an `id` in the payload",
            item.entity_kind, item.action
        ))
    })
}

#[async_trait]
impl SyncHandler for RemoteEntityHandler {
    async fn apply(&self, item: &QueueItem) -> Result<ApplyOutcome, AppError> {
        let collection = item.entity_kind.collection();
        match item.action {
            QueueAction::Create => {
                self.api.insert(collection, item.payload.as_json()).await?;
            }
            QueueAction::Update => {
                let id = require_record_id(item)?;
                self.api
                    .update(collection, &id, item.payload.as_json())
                    .await?;
            }
            QueueAction::Delete => {
                let id = require_record_id(item)?;
                self.api.delete(collection, &id).await?;
            }
        }
        Ok(ApplyOutcome::Applied)
    }
}
