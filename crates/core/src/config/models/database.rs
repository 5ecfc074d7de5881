use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{JoblessError, JoblessResult};

/// Location and pool settings of the shared job store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Directory holding the shared database file
    pub host: String,
    /// Database file stem; `:memory:` selects a private in-memory store
    pub name: String,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: ".".to_string(),
            name: "jobless".to_string(),
            max_connections: 5,
            busy_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.name == ":memory:"
    }

    /// Database file derived from `host` and `name`, used verbatim as a
    /// filesystem path
    pub fn path(&self) -> PathBuf {
        Path::new(&self.host).join(format!("{}.db", self.name))
    }

    pub fn validate(&self) -> JoblessResult<()> {
        if self.host.trim().is_empty() {
            return Err(JoblessError::Configuration(
                "database.host must not be empty".to_string(),
            ));
        }

        if self.name.trim().is_empty() {
            return Err(JoblessError::Configuration(
                "database.name must not be empty".to_string(),
            ));
        }

        if !self.is_in_memory() && self.name.contains('/') {
            return Err(JoblessError::Configuration(format!(
                "database.name must be a file stem, got '{}'",
                self.name
            )));
        }

        if self.max_connections == 0 {
            return Err(JoblessError::Configuration(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
