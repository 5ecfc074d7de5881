use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use jobless_core::{DatabaseConfig, LogLevel};
use jobless_domain::entities::{WorkerIdentity, WorkerStatus};
use jobless_infrastructure::{DatabaseManager, LogSink, Logger};
use jobless_worker::{handler_fn, JobContext, WorkerExit, WorkerLoop, WorkerOptions, WorkerState};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::timeout;

struct Store {
    _dir: tempfile::TempDir,
    manager: DatabaseManager,
}

async fn store() -> Result<Store> {
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig {
        host: dir.path().to_string_lossy().into_owned(),
        name: "worker_test".to_string(),
        ..DatabaseConfig::default()
    };
    let manager = DatabaseManager::new(&config).await?;
    Ok(Store { _dir: dir, manager })
}

fn identity() -> WorkerIdentity {
    WorkerIdentity::new("box-1", 4242, "deposits")
}

fn persistent_logger(manager: &DatabaseManager) -> Logger {
    Logger::Persistent(LogSink::new(
        manager.worker_repository(),
        manager.log_line_repository(),
        identity(),
    ))
}

fn polling_loop(
    manager: &DatabaseManager,
    handler: Arc<dyn jobless_worker::JobHandler>,
) -> Arc<WorkerLoop> {
    Arc::new(WorkerLoop::new(
        manager.job_repository(),
        manager.worker_repository(),
        persistent_logger(manager),
        identity(),
        handler,
        WorkerOptions::polling(vec!["resize".to_string()]).with_backoff(Duration::from_millis(20)),
    ))
}

#[tokio::test]
async fn test_successful_job_is_completed() -> Result<()> {
    let store = store().await?;
    let job = store
        .manager
        .job_repository()
        .register("resize", &json!({"id": 7}))
        .await?;

    let handler = Arc::new(handler_fn(|ctx: JobContext| async move {
        let id = ctx.payload().and_then(|p| p["id"].as_i64());
        anyhow::ensure!(id == Some(7), "wrong payload");
        ctx.logger().info("resized").await?;
        Ok(())
    }));
    let worker = polling_loop(&store.manager, handler);
    let mut states = worker.subscribe();
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run(rx).await }
    });

    timeout(Duration::from_secs(5), states.wait_for(|s| *s == WorkerState::Sleeping)).await??;
    tx.send(())?;
    assert_eq!(timeout(Duration::from_secs(5), handle).await??, WorkerExit::Shutdown);

    let job = store.manager.job_repository().find_by_id(job.id).await?.unwrap();
    assert!(job.started && job.completed && !job.failed);
    assert!(job.finished_at.is_some());

    let worker = store.manager.worker_repository().lookup(&identity()).await?.unwrap();
    assert!(worker.ended);
    assert_eq!(worker.status, WorkerStatus::Ended);

    let lines = store.manager.log_line_repository().find_by_worker(worker.id).await?;
    assert!(lines.iter().any(|l| l.message == "resized"));
    Ok(())
}

#[tokio::test]
async fn test_failed_job_records_message_and_error_line() -> Result<()> {
    let store = store().await?;
    let job = store
        .manager
        .job_repository()
        .register("resize", &json!({"id": 7}))
        .await?;

    let handler = Arc::new(handler_fn(|_| async { Err(anyhow::anyhow!("disk full")) }));
    let worker = polling_loop(&store.manager, handler);
    let mut states = worker.subscribe();
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run(rx).await }
    });

    timeout(Duration::from_secs(5), states.wait_for(|s| *s == WorkerState::Sleeping)).await??;
    tx.send(())?;
    timeout(Duration::from_secs(5), handle).await??;

    let job = store.manager.job_repository().find_by_id(job.id).await?.unwrap();
    assert!(job.failed && !job.completed);
    assert_eq!(job.failure_message.as_deref(), Some("disk full"));

    let lines = store.manager.log_line_repository().list_recent(50).await?;
    let error_line = lines
        .iter()
        .find(|l| l.level == LogLevel::Error && l.message.contains("disk full"))
        .expect("error line for the failed job");
    assert_eq!(error_line.exception_info.as_ref().unwrap().name, "HandlerFailure");
    assert_eq!(error_line.component, "deposits");
    assert!(error_line.worker_id.is_some());
    Ok(())
}

#[tokio::test]
async fn test_one_shot_task_runs_once_without_a_job() -> Result<()> {
    let store = store().await?;
    let worker = WorkerLoop::new(
        store.manager.job_repository(),
        store.manager.worker_repository(),
        persistent_logger(&store.manager),
        identity(),
        Arc::new(handler_fn(|ctx: JobContext| async move {
            anyhow::ensure!(ctx.job().is_none(), "one-shot tasks carry no job");
            Ok(())
        })),
        WorkerOptions::one_shot(),
    );
    let (_tx, rx) = broadcast::channel(1);

    assert_eq!(worker.run(rx).await, WorkerExit::Finished);

    let record = store.manager.worker_repository().lookup(&identity()).await?.unwrap();
    assert!(record.ended);
    Ok(())
}
