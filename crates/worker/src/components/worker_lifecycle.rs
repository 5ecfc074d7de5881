use std::sync::Arc;
use std::time::Duration;

use jobless_core::{AppConfig, JoblessResult};
use jobless_domain::{
    entities::{Job, WorkerIdentity, WorkerStatus},
    repositories::{JobRepository, WorkerRepository},
};
use jobless_infrastructure::Logger;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::{CheckInManager, JobExecutionManager};
use crate::handler::{JobContext, JobHandler};

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Claiming,
    Working,
    Sleeping,
    Terminated,
}

/// How a worker loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// One-shot handler returned successfully
    Finished,
    /// Stopped by the shutdown signal
    Shutdown,
    /// One-shot handler failed, or the loop itself hit an error
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Job kinds to claim; empty means a one-shot task
    pub kinds: Vec<String>,
    /// Sleep after a poll that found nothing
    pub backoff: Duration,
    /// Re-invocation period of a one-shot task run by an external scheduler
    pub period: Option<Duration>,
    /// Settings handed to the handler through its context
    pub settings: Arc<AppConfig>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            kinds: Vec::new(),
            backoff: DEFAULT_BACKOFF,
            period: None,
            settings: Arc::new(AppConfig::default()),
        }
    }
}

impl WorkerOptions {
    pub fn polling(kinds: Vec<String>) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    pub fn one_shot() -> Self {
        Self::default()
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_settings(mut self, settings: Arc<AppConfig>) -> Self {
        self.settings = settings;
        self
    }

    pub fn is_one_shot(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Check-in, claim, execute, sleep; until shutdown or a loop-level error.
pub struct WorkerLoop {
    jobs: Arc<dyn JobRepository>,
    workers: Arc<dyn WorkerRepository>,
    logger: Logger,
    identity: WorkerIdentity,
    executor: JobExecutionManager,
    options: WorkerOptions,
    state_tx: watch::Sender<WorkerState>,
}

impl WorkerLoop {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        workers: Arc<dyn WorkerRepository>,
        logger: Logger,
        identity: WorkerIdentity,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkerState::Ready);
        Self {
            jobs,
            workers,
            logger,
            identity,
            executor: JobExecutionManager::new(handler),
            options,
            state_tx,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        *self.state_tx.borrow()
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Run until the work is done, the loop fails or `shutdown` fires.
    ///
    /// The worker's registry record is terminated exactly once on every one of
    /// those paths, and also when this future is dropped mid-run.
    pub async fn run(&self, shutdown: broadcast::Receiver<()>) -> WorkerExit {
        let check_in = CheckInManager::new(Arc::clone(&self.workers), self.identity.clone());
        info!(
            "Starting worker {} (kinds: {:?})",
            self.identity, self.options.kinds
        );

        let exit = tokio::select! {
            result = self.run_until_done(&check_in) => match result {
                Ok(exit) => exit,
                Err(e) => {
                    let message = e.to_string();
                    error!("Worker {} stopped on loop error: {}", self.identity, message);
                    if let Err(log_err) = self.logger.error(&anyhow::Error::new(e)).await {
                        error!("Failed to record loop error: {}", log_err);
                    }
                    WorkerExit::Failed(message)
                }
            },
            _ = wait_for_shutdown(shutdown) => {
                info!("Worker {} received shutdown signal", self.identity);
                WorkerExit::Shutdown
            }
        };

        if let Err(e) = check_in.terminate().await {
            warn!("Failed to terminate worker {}: {}", self.identity, e);
        }
        self.set_state(WorkerState::Terminated);
        info!("Worker {} terminated: {:?}", self.identity, exit);
        exit
    }

    async fn run_until_done(&self, check_in: &CheckInManager) -> JoblessResult<WorkerExit> {
        if self.options.is_one_shot() {
            self.run_one_shot(check_in).await
        } else {
            self.run_polling(check_in).await
        }
    }

    async fn run_one_shot(&self, check_in: &CheckInManager) -> JoblessResult<WorkerExit> {
        self.set_state(WorkerState::Ready);
        check_in.check_in(WorkerStatus::Ready).await?;

        if let Some(period) = self.options.period {
            self.logger
                .info(&format!(
                    "Periodic task {} expects to run every {:?}",
                    self.identity.name, period
                ))
                .await?;
        }

        self.set_state(WorkerState::Working);
        check_in.check_in(WorkerStatus::Working).await?;

        let ctx = self.context(None);
        match self.executor.execute(&ctx).await {
            Ok(()) => {
                self.logger
                    .info(&format!("Task {} finished", self.identity.name))
                    .await?;
                Ok(WorkerExit::Finished)
            }
            Err(err) => {
                self.logger.handler_failure(&err).await?;
                Ok(WorkerExit::Failed(format!("{err:#}")))
            }
        }
    }

    async fn run_polling(&self, check_in: &CheckInManager) -> JoblessResult<WorkerExit> {
        loop {
            self.set_state(WorkerState::Ready);
            check_in.check_in(WorkerStatus::Ready).await?;

            self.set_state(WorkerState::Claiming);
            match self.jobs.claim_next(&self.options.kinds).await? {
                Some(job) => {
                    self.set_state(WorkerState::Working);
                    check_in.check_in(WorkerStatus::Working).await?;
                    self.process(job).await?;
                }
                None => {
                    debug!(
                        "No jobs for {:?}, sleeping {:?}",
                        self.options.kinds, self.options.backoff
                    );
                    self.set_state(WorkerState::Sleeping);
                    tokio::time::sleep(self.options.backoff).await;
                }
            }
        }
    }

    /// Handler failures are recorded on the job and logged; only store
    /// errors escape.
    async fn process(&self, job: Job) -> JoblessResult<()> {
        info!("Working on {}", job.entity_description());
        let ctx = self.context(Some(job.clone()));

        match self.executor.execute(&ctx).await {
            Ok(()) => {
                self.jobs.mark_completed(&job).await?;
                info!("Completed {}", job.entity_description());
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!("{} failed: {}", job.entity_description(), message);
                self.jobs.mark_failed(&job, &message).await?;
                self.logger.handler_failure(&err).await?;
            }
        }
        Ok(())
    }

    fn context(&self, job: Option<Job>) -> JobContext {
        JobContext::new(job, self.identity.clone(), self.logger.clone())
            .with_settings(Arc::clone(&self.options.settings))
    }

    fn set_state(&self, state: WorkerState) {
        self.state_tx.send_replace(state);
    }
}

/// Resolves on a shutdown message; a closed channel never signals.
async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
    }
}
