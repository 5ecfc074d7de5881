use std::sync::Arc;
use std::time::Duration;

use jobless_core::{AppConfig, JoblessResult, LogLevel};
use jobless_domain::{
    entities::{Job, WorkerIdentity},
    repositories::{JobRepository, LogLineRepository, WorkerRepository},
};
use jobless_infrastructure::{DatabaseManager, LogCallback, LogRecord, LogSink, Logger};
use jobless_worker::{detect_identity, JobHandler, WorkerExit, WorkerLoop, WorkerOptions};
use tokio::sync::broadcast;
use tracing::info;

/// Everything a jobless process needs, built once and passed around
pub struct AppContext {
    config: Arc<AppConfig>,
    database: DatabaseManager,
    jobs: Arc<dyn JobRepository>,
    workers: Arc<dyn WorkerRepository>,
    log_lines: Arc<dyn LogLineRepository>,
    logger: Logger,
    identity: WorkerIdentity,
}

pub struct AppContextBuilder {
    config: AppConfig,
    custom_logger: Option<LogCallback>,
    identity: Option<WorkerIdentity>,
}

impl AppContextBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            custom_logger: None,
            identity: None,
        }
    }

    /// Callback used when the configured logger is `custom`
    pub fn custom_logger<F>(mut self, callback: F) -> Self
    where
        F: Fn(LogLevel, &LogRecord) + Send + Sync + 'static,
    {
        let callback: LogCallback = Arc::new(callback);
        self.custom_logger = Some(callback);
        self
    }

    /// Override the detected process identity
    pub fn identity(mut self, identity: WorkerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub async fn build(self) -> JoblessResult<AppContext> {
        self.config.validate()?;

        let identity = self.identity.unwrap_or_else(detect_identity);
        let database = DatabaseManager::new(&self.config.database).await?;
        let jobs = database.job_repository();
        let workers = database.worker_repository();
        let log_lines = database.log_line_repository();

        let sink = LogSink::new(Arc::clone(&workers), Arc::clone(&log_lines), identity.clone());
        let logger = Logger::from_setting(self.config.logger, sink, self.custom_logger)?;

        info!("Application context ready for {} ({:?})", identity, logger);
        Ok(AppContext {
            config: Arc::new(self.config),
            database,
            jobs,
            workers,
            log_lines,
            logger,
            identity,
        })
    }
}

impl AppContext {
    pub fn builder(config: AppConfig) -> AppContextBuilder {
        AppContextBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn jobs(&self) -> Arc<dyn JobRepository> {
        Arc::clone(&self.jobs)
    }

    pub fn workers(&self) -> Arc<dyn WorkerRepository> {
        Arc::clone(&self.workers)
    }

    pub fn log_lines(&self) -> Arc<dyn LogLineRepository> {
        Arc::clone(&self.log_lines)
    }

    pub async fn register_job(&self, kind: &str, payload: serde_json::Value) -> JoblessResult<Job> {
        self.jobs.register(kind, &payload).await
    }

    /// Worker loop bound to this process identity and logger
    pub fn worker(&self, options: WorkerOptions, handler: Arc<dyn JobHandler>) -> WorkerLoop {
        WorkerLoop::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.workers),
            self.logger.clone(),
            self.identity.clone(),
            handler,
            options.with_settings(Arc::clone(&self.config)),
        )
    }

    /// Claim and run jobs of `kinds` until shutdown or a loop error
    pub async fn run_worker(
        &self,
        kinds: Vec<String>,
        handler: Arc<dyn JobHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> WorkerExit {
        let options = WorkerOptions::polling(kinds).with_backoff(self.config.worker.backoff());
        self.worker(options, handler).run(shutdown).await
    }

    /// Run `handler` once without a job
    pub async fn task(
        &self,
        handler: Arc<dyn JobHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> WorkerExit {
        self.worker(WorkerOptions::one_shot(), handler)
            .run(shutdown)
            .await
    }

    /// One run of a task an external scheduler re-invokes every `period`
    pub async fn periodic(
        &self,
        period: Duration,
        handler: Arc<dyn JobHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> WorkerExit {
        self.worker(WorkerOptions::one_shot().with_period(period), handler)
            .run(shutdown)
            .await
    }

    pub async fn error(&self, err: &anyhow::Error) -> JoblessResult<()> {
        self.logger.error(err).await
    }

    pub async fn warn(&self, message: &str) -> JoblessResult<()> {
        self.logger.warn(message).await
    }

    pub async fn info(&self, message: &str) -> JoblessResult<()> {
        self.logger.info(message).await
    }

    pub async fn debug(&self, message: &str) -> JoblessResult<()> {
        self.logger.debug(message).await
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
