use async_trait::async_trait;
use chrono::Utc;
use jobless_core::{JoblessError, JoblessResult};
use jobless_domain::{entities::Job, repositories::JobRepository};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const JOB_COLUMNS: &str = "id, kind, payload, started, completed, failed, failure_message, \
                           created_at, started_at, finished_at";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> JoblessResult<Job> {
        let payload: String = row.try_get("payload")?;
        let payload = serde_json::from_str(&payload).map_err(|e| {
            JoblessError::Serialization(format!("failed to decode job payload: {e}"))
        })?;

        Ok(Job {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            payload,
            started: row.try_get("started")?,
            completed: row.try_get("completed")?,
            failed: row.try_get("failed")?,
            failure_message: row.try_get("failure_message")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }

    /// Explain why a finishing update matched no row.
    async fn finish_rejected(&self, job: &Job) -> JoblessError {
        match self.find_by_id(job.id).await {
            Ok(Some(current)) if !current.started => JoblessError::InvalidJobState {
                id: job.id,
                message: "job was never claimed".to_string(),
            },
            Ok(Some(_)) => JoblessError::InvalidJobState {
                id: job.id,
                message: "job already finished".to_string(),
            },
            Ok(None) => JoblessError::JobNotFound { id: job.id },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, payload), fields(job.kind = %kind))]
    async fn register(&self, kind: &str, payload: &serde_json::Value) -> JoblessResult<Job> {
        let payload_json = serde_json::to_string(payload)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (kind, payload, started, completed, failed, created_at)
            VALUES (?, ?, 0, 0, 0, ?)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(kind)
        .bind(payload_json)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let job = Self::row_to_job(&row)?;
        debug!("Registered {}", job.entity_description());
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn claim_next(&self, kinds: &[String]) -> JoblessResult<Option<Job>> {
        if kinds.is_empty() {
            return Ok(None);
        }

        // One statement: the write lock is taken before the subquery reads, and
        // the `started = 0` guard makes the update a compare-and-set.
        let placeholders = vec!["?"; kinds.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE jobs
            SET started = 1, started_at = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE started = 0 AND kind IN ({placeholders})
                LIMIT 1
            )
            AND started = 0
            RETURNING {JOB_COLUMNS}
            "#
        );

        let mut query = sqlx::query(&sql).bind(Utc::now());
        for kind in kinds {
            query = query.bind(kind.as_str());
        }

        let row = query.fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let job = Self::row_to_job(&row)?;
                debug!("Claimed {}", job.entity_description());
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, job), fields(job.id = job.id))]
    async fn mark_completed(&self, job: &Job) -> JoblessResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET completed = 1, finished_at = ?
            WHERE id = ? AND started = 1 AND completed = 0 AND failed = 0
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(job.id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let job = Self::row_to_job(&row)?;
                debug!("Completed {}", job.entity_description());
                Ok(job)
            }
            None => Err(self.finish_rejected(job).await),
        }
    }

    #[instrument(skip(self, job, failure_message), fields(job.id = job.id))]
    async fn mark_failed(&self, job: &Job, failure_message: &str) -> JoblessResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET failed = 1, failure_message = ?, finished_at = ?
            WHERE id = ? AND started = 1 AND completed = 0 AND failed = 0
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(failure_message)
        .bind(Utc::now())
        .bind(job.id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let job = Self::row_to_job(&row)?;
                debug!("Failed {}: {}", job.entity_description(), failure_message);
                Ok(job)
            }
            None => Err(self.finish_rejected(job).await),
        }
    }

    async fn find_by_id(&self, id: i64) -> JoblessResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn list_by_kind(&self, kind: &str) -> JoblessResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE kind = ? ORDER BY id"
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }
}
