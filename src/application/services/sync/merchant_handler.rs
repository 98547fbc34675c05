use super::entity_handler::require_record_id;
use super::handler::{ApplyOutcome, SyncHandler};
use crate::application::ports::remote_backend::RemoteWriteApi;
use crate::application::services::photo_upload::{PhotoUploader, is_data_uri};
use crate::domain::entities::offline::QueueItem;
use crate::domain::value_objects::offline::{EntityKind, QueueAction};
use crate::shared::config::{MerchantConfig, PhotoPolicy};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// 加盟店登録の同期ハンドラ
///
/// Creation is guarded by a natural-key lookup: when the backend already holds
/// a merchant with the same key, the queued create is treated as applied and
/// nothing is written. Embedded data-URI photos are uploaded first and
/// replaced by `<field>_url`; the record is only written once every photo is
/// stored. Only unreadable photos can be dropped by the photo policy.
pub struct MerchantHandler {
    api: Arc<dyn RemoteWriteApi>,
    photos: Arc<PhotoUploader>,
    natural_key_field: String,
}

impl MerchantHandler {
    pub fn new(
        api: Arc<dyn RemoteWriteApi>,
        photos: Arc<PhotoUploader>,
        config: &MerchantConfig,
    ) -> Self {
        Self {
            api,
            photos,
            natural_key_field: config.natural_key_field.trim().to_string(),
        }
    }

    fn collection() -> &'static str {
        EntityKind::Merchants.collection()
    }

    fn natural_key<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a str> {
        record
            .get(&self.natural_key_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    async fn already_exists(&self, key: &str) -> Result<bool, AppError> {
        let existing = self
            .api
            .find_by_key(Self::collection(), &self.natural_key_field, key)
            .await?;
        Ok(existing.is_some())
    }

    async fn upload_photos(
        &self,
        item: &QueueItem,
        record: &mut Map<String, Value>,
        prefix: &str,
    ) -> Result<(), AppError> {
        for field in self.photos.photo_fields() {
            let Some(data_uri) = record
                .get(field)
                .and_then(Value::as_str)
                .filter(|value| is_data_uri(value))
                .map(str::to_string)
            else {
                continue;
            };

            match self.photos.upload_data_uri(&data_uri, prefix, field).await {
                Ok(url) => {
                    record.remove(field);
                    record.insert(format!("{field}_url"), Value::String(url));
                }
                Err(AppError::MalformedImageData(reason))
                    if self.photos.policy() == PhotoPolicy::SyncWithoutPhoto =>
                {
                    tracing::warn!(
                        target: "offline::photo",
                        id = %item.id,
                        field = field.as_str(),
                        reason = %reason,
                        "dropping corrupt photo, syncing record without it"
                    );
                    record.remove(field);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SyncHandler for MerchantHandler {
    async fn apply(&self, item: &QueueItem) -> Result<ApplyOutcome, AppError> {
        let mut record = item.payload.as_object().cloned().ok_or_else(|| {
            AppError::ValidationError("Merchant payload must be a JSON object".to_string())
        })?;

        match item.action {
            QueueAction::Create => {
                let key = self.natural_key(&record).map(str::to_string);
                if let Some(key) = &key
                    && self.already_exists(key).await?
                {
                    tracing::info!(
                        target: "offline::sync",
                        id = %item.id,
                        natural_key = %key,
                        "merchant already exists remotely, keeping server copy"
                    );
                    return Ok(ApplyOutcome::AlreadyApplied);
                }

                let prefix = format!(
                    "{}/{}",
                    Self::collection(),
                    key.as_deref().unwrap_or("unkeyed")
                );
                self.upload_photos(item, &mut record, &prefix).await?;
                self.api
                    .insert(Self::collection(), &Value::Object(record))
                    .await?;
            }
            QueueAction::Update => {
                let id = require_record_id(item)?;
                let prefix = format!("{}/{}", Self::collection(), id);
                self.upload_photos(item, &mut record, &prefix).await?;
                self.api
                    .update(Self::collection(), &id, &Value::Object(record))
                    .await?;
            }
            QueueAction::Delete => {
                let id = require_record_id(item)?;
                self.api.delete(Self::collection(), &id).await?;
            }
        }

        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::photo_upload::tests::png_data_uri;
    use crate::application::services::sync::mocks::{MockBackend, RemoteCall};
    use crate::domain::value_objects::offline::{QueueItemStatus, QueuePayload, SyncQueueId};
    use crate::shared::config::AppConfig;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn handler_with(backend: Arc<MockBackend>, policy: PhotoPolicy) -> MerchantHandler {
        let mut config = AppConfig::default();
        config.photos.policy = policy;
        let photos = Arc::new(PhotoUploader::new(backend.clone(), config.photos));
        MerchantHandler::new(backend, photos, &config.merchants)
    }

    fn create_item(payload: Value) -> QueueItem {
        QueueItem {
            id: SyncQueueId::new(3).unwrap(),
            entity_kind: EntityKind::Merchants,
            action: QueueAction::Create,
            payload: QueuePayload::new(payload).unwrap(),
            status: QueueItemStatus::Pending,
            created_at: Utc::now(),
            retry_count: 0,
            last_retry_at: None,
            last_error: None,
        }
    }

    fn photo() -> String {
        png_data_uri(8, 8)
    }

    #[tokio::test]
    async fn existing_natural_key_is_already_applied_without_writes() {
        let backend = Arc::new(MockBackend::with_existing_key("ENR-001"));
        let handler = handler_with(backend.clone(), PhotoPolicy::SyncWithoutPhoto);

        let outcome = handler
            .apply(&create_item(json!({
                "enrollment_code": "ENR-001",
                "full_name": "Awa Koné",
                "profile_photo": photo(),
            })))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
        assert_eq!(
            backend.calls(),
            vec![RemoteCall::Find(
                "merchants".into(),
                "enrollment_code".into(),
                "ENR-001".into()
            )]
        );
    }

    #[tokio::test]
    async fn photos_are_uploaded_and_replaced_by_urls() {
        let backend = Arc::new(MockBackend::default());
        let handler = handler_with(backend.clone(), PhotoPolicy::SyncWithoutPhoto);

        let outcome = handler
            .apply(&create_item(json!({
                "enrollment_code": "ENR-002",
                "profile_photo": photo(),
                "id_card_photo": "https://cdn.test/already-there.jpg",
            })))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        let RemoteCall::Upload(path) = &calls[1] else {
            panic!("expected upload, got {:?}", calls[1]);
        };
        assert!(path.starts_with("merchants/ENR-002/profile_photo-"));
        let RemoteCall::Insert(collection, record) = &calls[2] else {
            panic!("expected insert, got {:?}", calls[2]);
        };
        assert_eq!(collection, "merchants");
        assert!(record.get("profile_photo").is_none());
        assert_eq!(record["profile_photo_url"], format!("https://cdn.test/{path}"));
        assert_eq!(record["id_card_photo"], "https://cdn.test/already-there.jpg");
    }

    #[tokio::test]
    async fn upload_failure_fails_whole_item_without_insert() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_uploads.store(true, Ordering::SeqCst);
        let handler = handler_with(backend.clone(), PhotoPolicy::SyncWithoutPhoto);

        let err = handler
            .apply(&create_item(json!({
                "enrollment_code": "ENR-003",
                "profile_photo": photo(),
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UploadFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_photo_follows_policy() {
        let corrupt = json!({
            "enrollment_code": "ENR-004",
            "profile_photo": "data:image/jpeg;base64,%%%",
        });

        let backend = Arc::new(MockBackend::default());
        let lenient = handler_with(backend.clone(), PhotoPolicy::SyncWithoutPhoto);
        assert_eq!(
            lenient.apply(&create_item(corrupt.clone())).await.unwrap(),
            ApplyOutcome::Applied
        );
        let calls = backend.calls();
        let RemoteCall::Insert(_, record) = calls.last().unwrap() else {
            panic!("expected insert");
        };
        assert!(record.get("profile_photo").is_none());
        assert!(record.get("profile_photo_url").is_none());

        let backend = Arc::new(MockBackend::default());
        let strict = handler_with(backend.clone(), PhotoPolicy::HoldBack);
        let err = strict.apply(&create_item(corrupt)).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedImageData(_)));
        assert!(!err.is_retryable());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn oversized_valid_photo_is_never_dropped() {
        let backend = Arc::new(MockBackend::default());
        let mut config = AppConfig::default();
        config.photos.max_bytes = 16;
        let photos = Arc::new(PhotoUploader::new(backend.clone(), config.photos));
        let handler = MerchantHandler::new(backend.clone(), photos, &config.merchants);

        let err = handler
            .apply(&create_item(json!({
                "enrollment_code": "ENR-005",
                "profile_photo": png_data_uri(64, 64),
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ImageTooLarge(_)), "{err:?}");
        assert!(!err.is_retryable());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn natural_key_field_is_configurable() {
        let backend = Arc::new(MockBackend::with_existing_key("RC-77"));
        let config = AppConfig::default();
        let photos = Arc::new(PhotoUploader::new(backend.clone(), config.photos));
        let handler = MerchantHandler::new(
            backend.clone(),
            photos,
            &MerchantConfig {
                natural_key_field: "registration_no".to_string(),
            },
        );

        let outcome = handler
            .apply(&create_item(json!({
                "registration_no": "RC-77",
                "enrollment_code": "ENR-006",
            })))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
        assert_eq!(
            backend.calls(),
            vec![RemoteCall::Find(
                "merchants".into(),
                "registration_no".into(),
                "RC-77".into()
            )]
        );
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let backend = Arc::new(MockBackend::default());
        let handler = handler_with(backend, PhotoPolicy::SyncWithoutPhoto);
        let err = handler
            .apply(&create_item(json!(["not", "an", "object"])))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
