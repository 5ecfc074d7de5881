//! In-memory repositories and a capturing logger for loop tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use jobless_core::{JoblessError, JoblessResult, LogLevel};
use jobless_domain::{
    entities::{Job, Worker, WorkerIdentity, WorkerStatus},
    repositories::{JobRepository, WorkerRepository},
};
use jobless_infrastructure::{LogCallback, LogRecord, Logger};

pub type CapturedLogs = Arc<Mutex<Vec<(LogLevel, LogRecord)>>>;

pub fn sample_job(id: i64, kind: &str, payload: serde_json::Value) -> Job {
    Job {
        id,
        kind: kind.to_string(),
        payload,
        started: false,
        completed: false,
        failed: false,
        failure_message: None,
        created_at: Utc::now(),
        started_at: None,
        finished_at: None,
    }
}

pub fn capturing_logger() -> (Logger, CapturedLogs) {
    let logs: CapturedLogs = Arc::new(Mutex::new(Vec::new()));
    let captured = logs.clone();
    let callback: LogCallback = Arc::new(move |level, record: &LogRecord| {
        captured.lock().unwrap().push((level, record.clone()));
    });
    (Logger::Custom(callback), logs)
}

#[derive(Default)]
pub struct MockJobRepository {
    pub jobs: Mutex<Vec<Job>>,
    pub claim_calls: AtomicUsize,
    pub fail_claims: AtomicBool,
}

impl MockJobRepository {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            ..Default::default()
        }
    }

    pub fn get(&self, id: i64) -> Option<Job> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    fn finish(&self, job: &Job, apply: impl FnOnce(&mut Job)) -> JoblessResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or(JoblessError::JobNotFound { id: job.id })?;
        if !stored.started || stored.is_finished() {
            return Err(JoblessError::InvalidJobState {
                id: job.id,
                message: "not finishable".to_string(),
            });
        }
        apply(stored);
        stored.finished_at = Some(Utc::now());
        Ok(stored.clone())
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn register(&self, kind: &str, payload: &serde_json::Value) -> JoblessResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = sample_job(jobs.len() as i64 + 1, kind, payload.clone());
        jobs.push(job.clone());
        Ok(job)
    }

    async fn claim_next(&self, kinds: &[String]) -> JoblessResult<Option<Job>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(JoblessError::Internal("store unreachable".to_string()));
        }
        let mut jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter_mut()
            .find(|j| !j.started && kinds.contains(&j.kind))
            .map(|j| {
                j.started = true;
                j.started_at = Some(Utc::now());
                j.clone()
            }))
    }

    async fn mark_completed(&self, job: &Job) -> JoblessResult<Job> {
        self.finish(job, |j| j.completed = true)
    }

    async fn mark_failed(&self, job: &Job, failure_message: &str) -> JoblessResult<Job> {
        self.finish(job, |j| {
            j.failed = true;
            j.failure_message = Some(failure_message.to_string());
        })
    }

    async fn find_by_id(&self, id: i64) -> JoblessResult<Option<Job>> {
        Ok(self.get(id))
    }

    async fn list_by_kind(&self, kind: &str) -> JoblessResult<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.kind == kind)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockWorkerRepository {
    pub workers: Mutex<Vec<Worker>>,
    pub check_ins: Mutex<Vec<WorkerStatus>>,
    pub terminate_calls: AtomicUsize,
}

impl MockWorkerRepository {
    pub fn terminate_count(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.check_ins.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerRepository for MockWorkerRepository {
    async fn check_in(
        &self,
        identity: &WorkerIdentity,
        status: WorkerStatus,
    ) -> JoblessResult<Worker> {
        self.check_ins.lock().unwrap().push(status);
        let mut workers = self.workers.lock().unwrap();
        let index = match workers.iter().position(|w| w.identity() == *identity) {
            Some(index) => index,
            None => {
                let id = workers.len() as i64 + 1;
                workers.push(Worker {
                    id,
                    host: identity.host.clone(),
                    pid: identity.pid,
                    name: identity.name.clone(),
                    status,
                    check_in_at: Utc::now(),
                    ended: false,
                });
                workers.len() - 1
            }
        };
        let worker = &mut workers[index];
        worker.status = status;
        worker.check_in_at = Utc::now();
        worker.ended = false;
        Ok(worker.clone())
    }

    async fn terminate(&self, identity: &WorkerIdentity) -> JoblessResult<bool> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        let mut workers = self.workers.lock().unwrap();
        match workers.iter_mut().find(|w| w.identity() == *identity) {
            Some(worker) => {
                worker.ended = true;
                worker.status = WorkerStatus::Ended;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn lookup(&self, identity: &WorkerIdentity) -> JoblessResult<Option<Worker>> {
        Ok(self
            .workers
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.identity() == *identity)
            .cloned())
    }

    async fn list(&self) -> JoblessResult<Vec<Worker>> {
        Ok(self.workers.lock().unwrap().clone())
    }
}
