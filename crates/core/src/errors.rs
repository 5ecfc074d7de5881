use thiserror::Error;

/// Error taxonomy shared by every jobless crate
#[derive(Debug, Error)]
pub enum JoblessError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("job not found: {id}")]
    JobNotFound { id: i64 },

    #[error("job {id} cannot be finished: {message}")]
    InvalidJobState { id: i64, message: String },

    #[error("handler failure: {0}")]
    HandlerFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JoblessError {
    /// Stable category name, used as the exception name on persisted log lines.
    pub fn category(&self) -> &'static str {
        match self {
            JoblessError::Database(_) => "DatabaseError",
            JoblessError::Configuration(_) => "ConfigurationError",
            JoblessError::Serialization(_) => "SerializationError",
            JoblessError::JobNotFound { .. } => "JobNotFound",
            JoblessError::InvalidJobState { .. } => "InvalidJobState",
            JoblessError::HandlerFailure(_) => "HandlerFailure",
            JoblessError::Internal(_) => "InternalError",
        }
    }
}

impl From<serde_json::Error> for JoblessError {
    fn from(err: serde_json::Error) -> Self {
        JoblessError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for JoblessError {
    fn from(err: config::ConfigError) -> Self {
        JoblessError::Configuration(err.to_string())
    }
}
