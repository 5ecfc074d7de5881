use serde::{Deserialize, Serialize};

use crate::{JoblessError, JoblessResult};

/// Process-level tracing output (independent of the persisted log lines)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> JoblessResult<()> {
        if self.log_level.trim().is_empty() {
            return Err(JoblessError::Configuration(
                "observability.log_level must not be empty".to_string(),
            ));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(JoblessError::Configuration(format!(
                "invalid observability.log_format: {}, supported: {:?}",
                self.log_format, valid_formats
            )));
        }

        Ok(())
    }
}
