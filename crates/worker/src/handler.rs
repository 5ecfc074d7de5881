use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use jobless_core::AppConfig;
use jobless_domain::entities::{Job, WorkerIdentity};
use jobless_infrastructure::Logger;

/// Everything a handler gets to see for one invocation
#[derive(Debug, Clone)]
pub struct JobContext {
    job: Option<Job>,
    identity: WorkerIdentity,
    logger: Logger,
    settings: Arc<AppConfig>,
}

impl JobContext {
    pub fn new(job: Option<Job>, identity: WorkerIdentity, logger: Logger) -> Self {
        Self {
            job,
            identity,
            logger,
            settings: Arc::new(AppConfig::default()),
        }
    }

    pub fn with_settings(mut self, settings: Arc<AppConfig>) -> Self {
        self.settings = settings;
        self
    }

    /// The claimed job; `None` for one-shot tasks
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.job.as_ref().map(|job| &job.payload)
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Logger attributed to the running worker
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Settings of the application that started the worker
    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }
}

/// User code run for each claimed job or one-shot task.
///
/// Returning an error (or panicking) fails the job; the worker keeps going.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: &JobContext) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`JobHandler`]
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &JobContext) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }
}
