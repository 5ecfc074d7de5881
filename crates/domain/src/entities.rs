use std::backtrace::BacktraceStatus;
use std::fmt;

use chrono::{DateTime, Utc};
use jobless_core::{JoblessError, LogLevel};
use serde::{Deserialize, Serialize};

/// A persisted unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// Routing tag matched against a worker's kind filter
    pub kind: String,
    pub payload: serde_json::Value,
    pub started: bool,
    pub completed: bool,
    pub failed: bool,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_pending(&self) -> bool {
        !self.started
    }

    pub fn is_finished(&self) -> bool {
        self.completed || self.failed
    }

    pub fn entity_description(&self) -> String {
        format!("job {} (kind: {})", self.id, self.kind)
    }
}

/// Process identity of a running worker; (host, pid) is the unique key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub host: String,
    pub pid: u32,
    /// Executable base name, used as the log component
    pub name: String,
}

impl WorkerIdentity {
    pub fn new(host: impl Into<String>, pid: u32, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            pid,
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.pid)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Ready,
    Working,
    Ended,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Ready => "ready",
            WorkerStatus::Working => "working",
            WorkerStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for WorkerStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for WorkerStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "ready" => Ok(WorkerStatus::Ready),
            "working" => Ok(WorkerStatus::Working),
            "ended" => Ok(WorkerStatus::Ended),
            _ => Err(format!("Invalid worker status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for WorkerStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// Registry record of a running (or ended) worker process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: i64,
    pub host: String,
    pub pid: u32,
    pub name: String,
    pub status: WorkerStatus,
    pub check_in_at: DateTime<Utc>,
    pub ended: bool,
}

impl Worker {
    pub fn identity(&self) -> WorkerIdentity {
        WorkerIdentity::new(self.host.clone(), self.pid, self.name.clone())
    }
}

/// Error details captured alongside an error-level log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub name: String,
    pub message: String,
    pub backtrace: Vec<String>,
}

impl ExceptionInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>, backtrace: Vec<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            backtrace,
        }
    }

    /// Capture name, message and backtrace frames from an error.
    ///
    /// The name is the error category for `JoblessError`s and `fallback_name`
    /// for anything else. Frames are only present when the error captured a
    /// backtrace (`RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`).
    pub fn from_error(error: &anyhow::Error, fallback_name: &str) -> Self {
        let name = error
            .downcast_ref::<JoblessError>()
            .map(|e| e.category().to_string())
            .unwrap_or_else(|| fallback_name.to_string());

        let backtrace = error.backtrace();
        let frames = match backtrace.status() {
            BacktraceStatus::Captured => parse_backtrace_frames(&backtrace.to_string()),
            _ => Vec::new(),
        };

        Self {
            name,
            message: format!("{error:#}"),
            backtrace: frames,
        }
    }
}

/// One descriptor per frame: `"<symbol> (at <location>)"`.
fn parse_backtrace_frames(rendered: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                last.push_str(&format!(" (at {location})"));
                continue;
            }
        }
        let symbol = match line.split_once(": ") {
            Some((index, symbol)) if index.chars().all(|c| c.is_ascii_digit()) => symbol,
            _ => line,
        };
        frames.push(symbol.to_string());
    }
    frames
}

/// A persisted, immutable log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub id: i64,
    pub message: String,
    pub level: LogLevel,
    pub component: String,
    /// Attribution only; the worker does not own its log lines
    pub worker_id: Option<i64>,
    pub exception_info: Option<ExceptionInfo>,
    pub created_at: DateTime<Utc>,
}

/// Insert model for [`LogLine`]
#[derive(Debug, Clone)]
pub struct NewLogLine {
    pub message: String,
    pub level: LogLevel,
    pub component: String,
    pub worker_id: Option<i64>,
    pub exception_info: Option<ExceptionInfo>,
}
