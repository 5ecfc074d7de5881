//! Storage abstractions consumed by the worker loop and the log sink.

use async_trait::async_trait;
use jobless_core::JoblessResult;

use crate::entities::{Job, LogLine, NewLogLine, Worker, WorkerIdentity, WorkerStatus};

/// Job store: registration, atomic claim and outcome recording
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a new job with every state flag cleared.
    async fn register(&self, kind: &str, payload: &serde_json::Value) -> JoblessResult<Job>;

    /// Atomically mark one unstarted job of a listed kind as started and return it.
    ///
    /// Under concurrent callers each job is handed out at most once. Which of
    /// several eligible jobs is returned is store order, not FIFO.
    async fn claim_next(&self, kinds: &[String]) -> JoblessResult<Option<Job>>;

    async fn mark_completed(&self, job: &Job) -> JoblessResult<Job>;

    async fn mark_failed(&self, job: &Job, failure_message: &str) -> JoblessResult<Job>;

    async fn find_by_id(&self, id: i64) -> JoblessResult<Option<Job>>;

    async fn list_by_kind(&self, kind: &str) -> JoblessResult<Vec<Job>>;
}

/// Worker registry keyed by (host, pid)
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Upsert the worker record and refresh its heartbeat.
    async fn check_in(&self, identity: &WorkerIdentity, status: WorkerStatus)
        -> JoblessResult<Worker>;

    /// Mark the worker ended. Returns false when no record exists.
    async fn terminate(&self, identity: &WorkerIdentity) -> JoblessResult<bool>;

    async fn lookup(&self, identity: &WorkerIdentity) -> JoblessResult<Option<Worker>>;

    async fn list(&self) -> JoblessResult<Vec<Worker>>;
}

/// Append-only log line storage
#[async_trait]
pub trait LogLineRepository: Send + Sync {
    async fn create(&self, line: &NewLogLine) -> JoblessResult<LogLine>;

    async fn find_by_worker(&self, worker_id: i64) -> JoblessResult<Vec<LogLine>>;

    /// Most recent lines first
    async fn list_recent(&self, limit: i64) -> JoblessResult<Vec<LogLine>>;
}
