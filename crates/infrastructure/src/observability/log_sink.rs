use std::sync::Arc;

use jobless_core::{JoblessResult, LogLevel};
use jobless_domain::{
    entities::{ExceptionInfo, LogLine, NewLogLine, WorkerIdentity},
    repositories::{LogLineRepository, WorkerRepository},
};
use tracing::debug;

/// Persists log lines attributed to the worker registered under an identity
#[derive(Clone)]
pub struct LogSink {
    workers: Arc<dyn WorkerRepository>,
    log_lines: Arc<dyn LogLineRepository>,
    identity: WorkerIdentity,
}

impl LogSink {
    pub fn new(
        workers: Arc<dyn WorkerRepository>,
        log_lines: Arc<dyn LogLineRepository>,
        identity: WorkerIdentity,
    ) -> Self {
        Self {
            workers,
            log_lines,
            identity,
        }
    }

    /// Identity used by the level helpers
    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Persist one line. An identity with no registry record still logs,
    /// just without a worker reference.
    pub async fn emit(
        &self,
        level: LogLevel,
        message: &str,
        identity: &WorkerIdentity,
        exception: Option<ExceptionInfo>,
    ) -> JoblessResult<LogLine> {
        let worker_id = self.workers.lookup(identity).await?.map(|w| w.id);
        if worker_id.is_none() {
            debug!("No worker registered for {}, log line is unattributed", identity);
        }

        self.log_lines
            .create(&NewLogLine {
                message: message.to_string(),
                level,
                component: identity.name.clone(),
                worker_id,
                exception_info: exception,
            })
            .await
    }

    /// Error-level line carrying the error's name, message and backtrace
    pub async fn error(&self, error: &anyhow::Error, fallback_name: &str) -> JoblessResult<LogLine> {
        let exception = ExceptionInfo::from_error(error, fallback_name);
        let message = exception.message.clone();
        self.emit(LogLevel::Error, &message, &self.identity, Some(exception))
            .await
    }

    pub async fn warn(&self, message: &str) -> JoblessResult<LogLine> {
        self.emit(LogLevel::Warn, message, &self.identity, None).await
    }

    pub async fn info(&self, message: &str) -> JoblessResult<LogLine> {
        self.emit(LogLevel::Info, message, &self.identity, None).await
    }

    pub async fn debug(&self, message: &str) -> JoblessResult<LogLine> {
        self.emit(LogLevel::Debug, message, &self.identity, None).await
    }
}
