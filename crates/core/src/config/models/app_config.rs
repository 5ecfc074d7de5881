use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{database::DatabaseConfig, observability::ObservabilityConfig, worker::WorkerConfig};
use crate::{JoblessError, JoblessResult};

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/jobless.toml",
    "jobless.toml",
    "/etc/jobless/config.toml",
];

/// Where log calls made through the application logger end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerSetting {
    /// `"<level>: <message>"` on stdout
    Console,
    /// Attributed log lines in the shared store
    Persistent,
    /// Caller-supplied callback, registered when the application is built
    Custom,
}

/// Process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub logger: LoggerSetting,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logger: LoggerSetting::Persistent,
            database: DatabaseConfig::default(),
            worker: WorkerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a config file and environment variables
    ///
    /// Load order:
    /// 1. Defaults
    /// 2. Config file (TOML); when `config_path` is None the first existing
    ///    default path is used, if any
    /// 3. Environment overrides (`JOBLESS_LOGGER`, `JOBLESS_DATABASE__HOST`, ...)
    pub fn load(config_path: Option<&str>) -> JoblessResult<Self> {
        let mut builder = Self::with_defaults(ConfigBuilder::builder())?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(JoblessError::Configuration(format!(
                    "config file not found: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("JOBLESS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults, without environment overrides
    pub fn from_toml_str(content: &str) -> JoblessResult<Self> {
        let config: AppConfig = Self::with_defaults(ConfigBuilder::builder())?
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration, e.g. for `jobless config`
    pub fn to_toml_string(&self) -> JoblessResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| JoblessError::Serialization(format!("failed to render config as TOML: {e}")))
    }

    pub fn validate(&self) -> JoblessResult<()> {
        self.database.validate()?;
        self.worker.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> JoblessResult<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = AppConfig::default();
        Ok(builder
            .set_default("logger", "persistent")?
            .set_default("database.host", defaults.database.host)?
            .set_default("database.name", defaults.database.name)?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default(
                "database.busy_timeout_seconds",
                defaults.database.busy_timeout_seconds,
            )?
            .set_default("worker.backoff_seconds", defaults.worker.backoff_seconds)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?)
    }
}
