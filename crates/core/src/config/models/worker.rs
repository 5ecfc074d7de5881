use serde::{Deserialize, Serialize};

use crate::{JoblessError, JoblessResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Sleep between unsuccessful claim attempts in polling mode
    pub backoff_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { backoff_seconds: 20 }
    }
}

impl WorkerConfig {
    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.backoff_seconds)
    }

    pub fn validate(&self) -> JoblessResult<()> {
        if self.backoff_seconds == 0 {
            return Err(JoblessError::Configuration(
                "worker.backoff_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
