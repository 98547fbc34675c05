use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 不正な画像データを含む加盟店レコードの扱い
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhotoPolicy {
    /// Drop the corrupt photo and sync the record without it.
    #[default]
    SyncWithoutPhoto,
    /// Keep the whole record back; the item becomes exhausted.
    HoldBack,
}

impl PhotoPolicy {
    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync_without_photo" | "skip" => Some(PhotoPolicy::SyncWithoutPhoto),
            "hold_back" | "hold" => Some(PhotoPolicy::HoldBack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub backend: BackendConfig,
    pub photos: PhotoConfig,
    pub merchants: MerchantConfig,
    pub connectivity: ConnectivityConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub item_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub storage_bucket: String,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoConfig {
    pub policy: PhotoPolicy,
    /// Longest edge in pixels after downscaling.
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub max_bytes: usize,
    pub photo_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    /// 重複登録の判定に使う自然キー
    pub natural_key_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_interval: 300, // 5 minutes
                max_retries: 5,
                base_delay_ms: 1_000,
                max_delay_ms: 30_000,
                item_timeout_ms: 30_000,
            },
            backend: BackendConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: None,
                storage_bucket: "merchant-photos".to_string(),
                request_timeout: 20,
            },
            photos: PhotoConfig {
                policy: PhotoPolicy::default(),
                max_dimension: 1280,
                jpeg_quality: 80,
                max_bytes: 5 * 1024 * 1024, // 5MB
                photo_fields: vec!["profile_photo".to_string(), "id_card_photo".to_string()],
            },
            merchants: MerchantConfig {
                natural_key_field: "enrollment_code".to_string(),
            },
            connectivity: ConnectivityConfig {
                settle_delay_ms: 2_000,
            },
            cache: CacheConfig {
                ttl_secs: Some(24 * 3600),
            },
        }
    }
}

impl SyncConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を構築する（テストでは環境変数の代わりに使う）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("JULABA_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }

        if let Some(v) = lookup("JULABA_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(v) = lookup("JULABA_SYNC_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Some(v) = lookup("JULABA_SYNC_MAX_RETRIES")
            && let Some(value) = parse_u32(&v)
        {
            cfg.sync.max_retries = value;
        }
        if let Some(v) = lookup("JULABA_SYNC_BASE_DELAY_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.base_delay_ms = value;
        }
        if let Some(v) = lookup("JULABA_SYNC_MAX_DELAY_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.max_delay_ms = value;
        }
        if let Some(v) = lookup("JULABA_SYNC_ITEM_TIMEOUT_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.item_timeout_ms = value.max(1);
        }

        if let Some(v) = lookup("JULABA_BACKEND_URL")
            && !v.trim().is_empty()
        {
            cfg.backend.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("JULABA_BACKEND_API_KEY") {
            let key = v.trim().to_string();
            cfg.backend.api_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Some(v) = lookup("JULABA_STORAGE_BUCKET") {
            cfg.backend.storage_bucket = v.trim().to_string();
        }

        if let Some(v) = lookup("JULABA_PHOTO_POLICY")
            && let Some(policy) = PhotoPolicy::from_value(&v)
        {
            cfg.photos.policy = policy;
        }
        if let Some(v) = lookup("JULABA_PHOTO_MAX_DIMENSION")
            && let Some(value) = parse_u32(&v)
        {
            cfg.photos.max_dimension = value;
        }
        if let Some(v) = lookup("JULABA_PHOTO_JPEG_QUALITY")
            && let Some(value) = parse_u32(&v)
        {
            cfg.photos.jpeg_quality = value.clamp(1, 100) as u8;
        }

        if let Some(v) = lookup("JULABA_MERCHANT_KEY_FIELD")
            && !v.trim().is_empty()
        {
            cfg.merchants.natural_key_field = v.trim().to_string();
        }

        if let Some(v) = lookup("JULABA_SETTLE_DELAY_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.connectivity.settle_delay_ms = value;
        }

        if let Some(v) = lookup("JULABA_CACHE_TTL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.cache.ttl_secs = if value == 0 { None } else { Some(value) };
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.base_delay_ms == 0 {
            return Err("Sync base_delay_ms must be greater than 0".to_string());
        }
        if self.sync.base_delay_ms > self.sync.max_delay_ms {
            return Err("Sync base_delay_ms must not exceed max_delay_ms".to_string());
        }
        if self.sync.auto_sync && self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if self.backend.storage_bucket.trim().is_empty() {
            return Err("Backend storage_bucket cannot be empty".to_string());
        }
        if self.photos.max_dimension == 0 {
            return Err("Photo max_dimension must be greater than 0".to_string());
        }
        if !(1..=100).contains(&self.photos.jpeg_quality) {
            return Err("Photo jpeg_quality must be between 1 and 100".to_string());
        }
        if self.merchants.natural_key_field.trim().is_empty() {
            return Err("Merchant natural_key_field cannot be empty".to_string());
        }
        Ok(())
    }
}

fn default_database_url() -> String {
    match dirs::data_local_dir() {
        Some(dir) => format!(
            "sqlite://{}?mode=rwc",
            dir.join("julaba").join("offline.db").display()
        ),
        None => "sqlite://./data/offline.db?mode=rwc".to_string(),
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
