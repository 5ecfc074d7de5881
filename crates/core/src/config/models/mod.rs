pub mod app_config;
pub mod database;
pub mod observability;
pub mod worker;

pub use app_config::{AppConfig, LoggerSetting};
pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
pub use worker::WorkerConfig;
