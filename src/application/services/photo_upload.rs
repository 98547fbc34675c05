use crate::application::ports::remote_backend::{ObjectStorage, StorageObject};
use crate::shared::config::{PhotoConfig, PhotoPolicy};
use crate::shared::error::AppError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const DATA_URI_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Bytes ready for upload, either the original encoding or a downscaled JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_len: usize,
}

impl PreparedImage {
    fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

/// 埋め込み写真（data URI）のデコード・縮小・アップロード
pub struct PhotoUploader {
    storage: Arc<dyn ObjectStorage>,
    config: PhotoConfig,
}

impl PhotoUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: PhotoConfig) -> Self {
        Self { storage, config }
    }

    pub fn policy(&self) -> PhotoPolicy {
        self.config.policy
    }

    pub fn photo_fields(&self) -> &[String] {
        &self.config.photo_fields
    }

    pub fn decode(&self, data_uri: &str) -> Result<DecodedImage, AppError> {
        decode_data_uri(data_uri)
    }

    /// Downscales to `max_dimension` and re-encodes as JPEG at `jpeg_quality`.
    ///
    /// An image that already fits and is smaller than its re-encoding is kept
    /// as is. Bytes that do not parse as an image are `MalformedImageData`; a
    /// valid image still above `max_bytes` is `ImageTooLarge`.
    pub fn compress(&self, image: &DecodedImage) -> Result<PreparedImage, AppError> {
        prepare_image(image, &self.config)
    }

    /// Content-addressed, so a retried upload lands on the same object.
    pub fn destination_path(&self, prefix: &str, field: &str, image: &PreparedImage) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&image.bytes);
        let digest = format!("{:x}", hasher.finalize());
        format!(
            "{}/{}-{}.{}",
            sanitize_segment(prefix),
            sanitize_segment(field),
            &digest[..16],
            image.extension()
        )
    }

    pub async fn upload(
        &self,
        image: &PreparedImage,
        destination_path: &str,
    ) -> Result<String, AppError> {
        let url = self
            .storage
            .upload(StorageObject {
                path: destination_path,
                bytes: &image.bytes,
                content_type: &image.mime_type,
            })
            .await
            .map_err(|err| match err {
                AppError::UploadFailed(_) => err,
                other => AppError::UploadFailed(other.to_string()),
            })?;

        tracing::info!(
            target: "offline::photo",
            path = destination_path,
            bytes = image.bytes.len(),
            "photo uploaded"
        );
        Ok(url)
    }

    /// decode → compress → upload in one step; returns the public URL.
    pub async fn upload_data_uri(
        &self,
        data_uri: &str,
        prefix: &str,
        field: &str,
    ) -> Result<String, AppError> {
        let decoded = self.decode(data_uri)?;
        // 画像処理は CPU 負荷が高いのでブロッキングスレッドで行う
        let config = self.config.clone();
        let prepared = tokio::task::spawn_blocking(move || prepare_image(&decoded, &config))
            .await
            .map_err(|err| AppError::Internal(format!("Image task failed: {err}")))??;
        let path = self.destination_path(prefix, field, &prepared);
        self.upload(&prepared, &path).await
    }
}

pub fn is_data_uri(value: &str) -> bool {
    value.starts_with(DATA_URI_PREFIX)
}

fn decode_data_uri(data_uri: &str) -> Result<DecodedImage, AppError> {
    let rest = data_uri
        .trim()
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| AppError::MalformedImageData("Not a data URI".to_string()))?;
    let (mime_type, encoded) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| AppError::MalformedImageData("Data URI is not base64".to_string()))?;

    let mime_type = mime_type.trim().to_ascii_lowercase();
    if !mime_type.starts_with("image/") || mime_type.len() == "image/".len() {
        return Err(AppError::MalformedImageData(format!(
            "Unsupported MIME type: {mime_type}"
        )));
    }

    let bytes = BASE64_STANDARD
        .decode(encoded.trim().as_bytes())
        .map_err(|err| AppError::MalformedImageData(format!("Invalid base64 payload: {err}")))?;
    if bytes.is_empty() {
        return Err(AppError::MalformedImageData("Image is empty".to_string()));
    }

    Ok(DecodedImage { mime_type, bytes })
}

fn prepare_image(image: &DecodedImage, config: &PhotoConfig) -> Result<PreparedImage, AppError> {
    let original_len = image.bytes.len();
    let format = image::guess_format(&image.bytes).map_err(|err| {
        AppError::MalformedImageData(format!("Unrecognised image format: {err}"))
    })?;
    let decoded = image::load_from_memory_with_format(&image.bytes, format)
        .map_err(|err| AppError::MalformedImageData(format!("Image could not be decoded: {err}")))?;

    let max = config.max_dimension.max(1);
    let (width, height) = decoded.dimensions();
    let oversized = width > max || height > max;
    let resized = if oversized {
        decoded.resize(max, max, FilterType::Triangle)
    } else {
        decoded
    };
    let reencoded = encode_jpeg(&resized, config.jpeg_quality)?;

    let prepared = if !oversized && original_len <= reencoded.len() {
        PreparedImage {
            mime_type: format.to_mime_type().to_string(),
            bytes: image.bytes.clone(),
            width,
            height,
            original_len,
        }
    } else {
        PreparedImage {
            mime_type: "image/jpeg".to_string(),
            bytes: reencoded,
            width: resized.width(),
            height: resized.height(),
            original_len,
        }
    };

    if prepared.bytes.len() > config.max_bytes {
        return Err(AppError::ImageTooLarge(format!(
            "{} bytes after compression, limit is {} bytes",
            prepared.bytes.len(),
            config.max_bytes
        )));
    }

    tracing::debug!(
        target: "offline::photo",
        mime_type = %prepared.mime_type,
        original_len,
        prepared_len = prepared.bytes.len(),
        width = prepared.width,
        height = prepared.height,
        "image prepared for upload"
    );
    Ok(prepared)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| AppError::Internal(format!("JPEG encoding failed: {err}")))?;
    Ok(bytes)
}

fn sanitize_segment(value: &str) -> String {
    value
        .trim_matches('/')
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '/' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
