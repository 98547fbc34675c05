pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

pub use shared::{AppConfig, AppError, Result};
pub use state::{OfflineRuntime, RemoteBackend};

/// ログ出力の初期化（二重呼び出しは無視される）
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "julaba_offline=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
