use crate::application::ports::remote_backend::{ObjectStorage, RemoteWriteApi, StorageObject};
use crate::shared::config::BackendConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// PostgREST 形式のバックエンドとストレージへの HTTP クライアント
#[derive(Clone)]
pub struct RestBackendClient {
    base_url: String,
    api_key: Option<String>,
    bucket: String,
    http: reqwest::Client,
}

impl RestBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let trimmed = config.base_url.trim();
        if trimmed.is_empty() {
            return Err(AppError::ConfigurationError(
                "Backend base_url is empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;

        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .clone()
                .filter(|value| !value.trim().is_empty()),
            bucket: config.storage_bucket.trim_matches('/').to_string(),
            http,
        })
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"))
        } else {
            builder
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        operation: &str,
        collection: &str,
    ) -> Result<reqwest::Response, AppError> {
        builder.send().await.map_err(|err| {
            tracing::warn!(
                target: "offline::remote",
                operation,
                collection,
                error = %err,
                "backend request failed"
            );
            transport_error(err)
        })
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(err.to_string())
    } else {
        AppError::Network(err.to_string())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<(), AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::remote(status.as_u16(), body))
}

#[async_trait]
impl RemoteWriteApi for RestBackendClient {
    async fn insert(&self, collection: &str, payload: &Value) -> Result<(), AppError> {
        let builder = self
            .request(Method::POST, &format!("/rest/v1/{collection}"))
            .header("Prefer", "return=minimal")
            .json(payload);
        let resp = self.send(builder, "insert", collection).await?;
        ensure_success(resp).await
    }

    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<(), AppError> {
        let builder = self
            .request(Method::PATCH, &format!("/rest/v1/{collection}"))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(payload);
        let resp = self.send(builder, "update", collection).await?;
        ensure_success(resp).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let builder = self
            .request(Method::DELETE, &format!("/rest/v1/{collection}"))
            .query(&[("id", format!("eq.{id}"))]);
        let resp = self.send(builder, "delete", collection).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(resp).await
    }

    async fn find_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError> {
        let builder = self
            .request(Method::GET, &format!("/rest/v1/{collection}"))
            .query(&[
                (field, format!("eq.{value}").as_str()),
                ("select", "id"),
                ("limit", "1"),
            ]);
        let resp = self.send(builder, "find_by_key", collection).await?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(AppError::remote(status.as_u16(), body));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;
        Ok(match parsed {
            Value::Array(mut rows) if !rows.is_empty() => Some(rows.swap_remove(0)),
            Value::Array(_) | Value::Null => None,
            other => Some(other),
        })
    }
}

#[async_trait]
impl ObjectStorage for RestBackendClient {
    async fn upload(&self, object: StorageObject<'_>) -> Result<String, AppError> {
        let path = object.path.trim_start_matches('/');
        let resp = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", self.bucket, path),
            )
            .header("Content-Type", object.content_type)
            .header("x-upsert", "true")
            .body(object.bytes.to_vec())
            .send()
            .await
            .map_err(|err| AppError::UploadFailed(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                target: "offline::remote",
                path,
                status = status.as_u16(),
                "photo upload rejected"
            );
            return Err(AppError::UploadFailed(format!("{status}: {body}")));
        }

        Ok(self.public_url(path))
    }
}
