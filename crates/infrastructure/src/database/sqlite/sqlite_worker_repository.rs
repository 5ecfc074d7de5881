use async_trait::async_trait;
use chrono::Utc;
use jobless_core::{JoblessError, JoblessResult};
use jobless_domain::{
    entities::{Worker, WorkerIdentity, WorkerStatus},
    repositories::WorkerRepository,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

const WORKER_COLUMNS: &str = "id, host, pid, name, status, check_in_at, ended";

pub struct SqliteWorkerRepository {
    pool: SqlitePool,
}

impl SqliteWorkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_worker(row: &sqlx::sqlite::SqliteRow) -> JoblessResult<Worker> {
        let pid: i64 = row.try_get("pid")?;
        let pid = u32::try_from(pid)
            .map_err(|_| JoblessError::Internal(format!("stored worker pid out of range: {pid}")))?;

        Ok(Worker {
            id: row.try_get("id")?,
            host: row.try_get("host")?,
            pid,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            check_in_at: row.try_get("check_in_at")?,
            ended: row.try_get("ended")?,
        })
    }
}

#[async_trait]
impl WorkerRepository for SqliteWorkerRepository {
    async fn check_in(
        &self,
        identity: &WorkerIdentity,
        status: WorkerStatus,
    ) -> JoblessResult<Worker> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO workers (host, pid, name, status, check_in_at, ended)
            VALUES (?, ?, ?, ?, ?, 0)
            ON CONFLICT(host, pid) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                check_in_at = excluded.check_in_at,
                ended = 0
            RETURNING {WORKER_COLUMNS}
            "#
        ))
        .bind(&identity.host)
        .bind(i64::from(identity.pid))
        .bind(&identity.name)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let worker = Self::row_to_worker(&row)?;
        debug!("Worker {} checked in as {}", identity, worker.status);
        Ok(worker)
    }

    async fn terminate(&self, identity: &WorkerIdentity) -> JoblessResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET ended = 1, status = ?, check_in_at = ?
            WHERE host = ? AND pid = ?
            "#,
        )
        .bind(WorkerStatus::Ended)
        .bind(Utc::now())
        .bind(&identity.host)
        .bind(i64::from(identity.pid))
        .execute(&self.pool)
        .await?;

        let terminated = result.rows_affected() > 0;
        if terminated {
            debug!("Worker {} terminated", identity);
        } else {
            debug!("Worker {} has no registry record to terminate", identity);
        }
        Ok(terminated)
    }

    async fn lookup(&self, identity: &WorkerIdentity) -> JoblessResult<Option<Worker>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE host = ? AND pid = ?"
        ))
        .bind(&identity.host)
        .bind(i64::from(identity.pid))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_worker).transpose()
    }

    async fn list(&self) -> JoblessResult<Vec<Worker>> {
        let rows = sqlx::query(&format!("SELECT {WORKER_COLUMNS} FROM workers ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_worker).collect()
    }
}
