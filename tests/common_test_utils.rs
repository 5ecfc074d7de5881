use anyhow::Result;
use jobless::AppContext;
use jobless_core::{AppConfig, LoggerSetting};
use jobless_domain::entities::WorkerIdentity;
use tempfile::TempDir;

/// Config pointing at a fresh on-disk store
pub fn temp_config(logger: LoggerSetting) -> Result<(TempDir, AppConfig)> {
    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.logger = logger;
    config.database.host = dir.path().to_string_lossy().into_owned();
    config.database.name = "jobless_it".to_string();
    config.worker.backoff_seconds = 1;
    Ok((dir, config))
}

#[allow(dead_code)]
pub async fn app_as(config: &AppConfig, pid: u32) -> Result<AppContext> {
    Ok(AppContext::builder(config.clone())
        .identity(WorkerIdentity::new("it-host", pid, format!("worker-{pid}")))
        .build()
        .await?)
}
