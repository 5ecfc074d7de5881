//! Typed configuration for jobless processes.
//!
//! Configuration is a fixed set of named sections. Sources are layered as
//! defaults, then an optional TOML file, then `JOBLESS_` environment variables
//! (`JOBLESS_DATABASE__HOST=/srv/queue`). Unknown keys are rejected.

pub mod models;

pub use models::{AppConfig, DatabaseConfig, LoggerSetting, ObservabilityConfig, WorkerConfig};
