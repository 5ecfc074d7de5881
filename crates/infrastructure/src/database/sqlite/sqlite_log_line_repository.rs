use async_trait::async_trait;
use chrono::Utc;
use jobless_core::{JoblessError, JoblessResult};
use jobless_domain::{
    entities::{ExceptionInfo, LogLine, NewLogLine},
    repositories::LogLineRepository,
};
use sqlx::{Row, SqlitePool};

const LOG_LINE_COLUMNS: &str =
    "id, message, level, component, worker_id, exception_info, created_at";

pub struct SqliteLogLineRepository {
    pool: SqlitePool,
}

impl SqliteLogLineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_log_line(row: &sqlx::sqlite::SqliteRow) -> JoblessResult<LogLine> {
        let exception_info: Option<String> = row.try_get("exception_info")?;
        let exception_info = exception_info
            .map(|raw| serde_json::from_str::<ExceptionInfo>(&raw))
            .transpose()
            .map_err(|e| {
                JoblessError::Serialization(format!("failed to decode exception info: {e}"))
            })?;

        Ok(LogLine {
            id: row.try_get("id")?,
            message: row.try_get("message")?,
            level: row.try_get("level")?,
            component: row.try_get("component")?,
            worker_id: row.try_get("worker_id")?,
            exception_info,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl LogLineRepository for SqliteLogLineRepository {
    async fn create(&self, line: &NewLogLine) -> JoblessResult<LogLine> {
        let exception_info = line
            .exception_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO log_lines (message, level, component, worker_id, exception_info, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {LOG_LINE_COLUMNS}
            "#
        ))
        .bind(&line.message)
        .bind(line.level)
        .bind(&line.component)
        .bind(line.worker_id)
        .bind(exception_info)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_log_line(&row)
    }

    async fn find_by_worker(&self, worker_id: i64) -> JoblessResult<Vec<LogLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_LINE_COLUMNS} FROM log_lines WHERE worker_id = ? ORDER BY id"
        ))
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_log_line).collect()
    }

    async fn list_recent(&self, limit: i64) -> JoblessResult<Vec<LogLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_LINE_COLUMNS} FROM log_lines ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_log_line).collect()
    }
}
