mod error;
pub use error::AppError;

mod config;
pub use config::{APP_CONFIG, AppConfig};
