use crate::domain::entities::offline::QueueItem;
use crate::domain::value_objects::offline::EntityKind;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The remote side already holds this mutation ("server wins").
    AlreadyApplied,
}

/// Applies one queued mutation against the remote backend.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn apply(&self, item: &QueueItem) -> Result<ApplyOutcome, AppError>;
}

/// エンティティ種別ごとの同期ハンドラ
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EntityKind, Arc<dyn SyncHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, kind: EntityKind) -> Result<Arc<dyn SyncHandler>, AppError> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::HandlerMissing(kind.to_string()))
    }

    pub fn missing_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<EntityKind, Arc<dyn SyncHandler>>,
}

impl HandlerRegistryBuilder {
    pub fn register(mut self, kind: EntityKind, handler: Arc<dyn SyncHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn register_all(
        mut self,
        kinds: impl IntoIterator<Item = EntityKind>,
        handler: Arc<dyn SyncHandler>,
    ) -> Self {
        for kind in kinds {
            self.handlers.insert(kind, Arc::clone(&handler));
        }
        self
    }

    /// Registry that tolerates gaps; unregistered kinds fail per item.
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }

    /// Fails unless every entity kind has a handler.
    pub fn build_complete(self) -> Result<HandlerRegistry, AppError> {
        let registry = self.build();
        let missing = registry.missing_kinds();
        if missing.is_empty() {
            return Ok(registry);
        }
        let names: Vec<&str> = missing.iter().map(EntityKind::as_str).collect();
        Err(AppError::HandlerMissing(names.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl SyncHandler for NoopHandler {
        async fn apply(&self, _item: &QueueItem) -> Result<ApplyOutcome, AppError> {
            Ok(ApplyOutcome::Applied)
        }
    }

    #[test]
    fn missing_kind_is_reported() {
        let registry = HandlerRegistry::builder()
            .register(EntityKind::Transactions, Arc::new(NoopHandler))
            .build();

        assert!(registry.get(EntityKind::Transactions).is_ok());
        assert!(matches!(
            registry.get(EntityKind::Invoices),
            Err(AppError::HandlerMissing(kind)) if kind == "invoices"
        ));
        assert_eq!(registry.missing_kinds().len(), EntityKind::ALL.len() - 1);
    }

    #[test]
    fn build_complete_checks_every_kind() {
        let err = HandlerRegistry::builder()
            .register(EntityKind::Merchants, Arc::new(NoopHandler))
            .build_complete()
            .err()
            .unwrap();
        assert!(err.to_string().contains("transactions"));
        assert!(!err.to_string().contains("merchants"));

        let registry = HandlerRegistry::builder()
            .register_all(EntityKind::ALL, Arc::new(NoopHandler))
            .build_complete()
            .unwrap();
        assert!(registry.missing_kinds().is_empty());
    }
}
