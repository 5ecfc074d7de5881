use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jobless_core::{DatabaseConfig, JoblessResult};
use jobless_domain::repositories::{JobRepository, LogLineRepository, WorkerRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::sqlite::{SqliteJobRepository, SqliteLogLineRepository, SqliteWorkerRepository};

/// Owns the connection pool to the shared store and hands out repositories
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect using the configured location and create the schema if needed
    pub async fn new(config: &DatabaseConfig) -> JoblessResult<Self> {
        let manager = if config.is_in_memory() {
            Self::in_memory().await?
        } else {
            Self::connect(
                &config.path(),
                config.max_connections,
                Duration::from_secs(config.busy_timeout_seconds),
            )
            .await?
        };
        manager.migrate().await?;
        Ok(manager)
    }

    /// Open (creating if missing) a file-backed store in WAL mode
    pub async fn connect(
        path: &Path,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> JoblessResult<Self> {
        debug!("Connecting to job store at {}", path.display());

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        Ok(Self { pool })
    }

    /// Private store living in a single connection; gone when the manager is dropped
    pub async fn in_memory() -> JoblessResult<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes; safe to run on every start
    pub async fn migrate(&self) -> JoblessResult<()> {
        debug!("Running job store migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT 'null',
                started INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                failure_message TEXT,
                created_at DATETIME NOT NULL,
                started_at DATETIME,
                finished_at DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                pid INTEGER NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                check_in_at DATETIME NOT NULL,
                ended INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS log_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message TEXT NOT NULL,
                level TEXT NOT NULL,
                component TEXT NOT NULL,
                worker_id INTEGER REFERENCES workers (id),
                exception_info TEXT,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_jobs_kind ON jobs(kind)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_started ON jobs(started)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_completed ON jobs(completed)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_failed ON jobs(failed)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_finished_at ON jobs(finished_at)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_workers_host_pid ON workers(host, pid)",
            "CREATE INDEX IF NOT EXISTS idx_log_lines_worker_id ON log_lines(worker_id)",
            "CREATE INDEX IF NOT EXISTS idx_log_lines_created_at ON log_lines(created_at)",
        ];
        for statement in indexes {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Job store schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> JoblessResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        Arc::new(SqliteJobRepository::new(self.pool.clone()))
    }

    pub fn worker_repository(&self) -> Arc<dyn WorkerRepository> {
        Arc::new(SqliteWorkerRepository::new(self.pool.clone()))
    }

    pub fn log_line_repository(&self) -> Arc<dyn LogLineRepository> {
        Arc::new(SqliteLogLineRepository::new(self.pool.clone()))
    }
}
