pub mod config;
pub mod error;

pub use config::{AppConfig, PhotoPolicy};
pub use error::{AppError, Result};
