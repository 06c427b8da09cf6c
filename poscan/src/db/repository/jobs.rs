use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Job, JobLogEntry, JobStatus};

pub struct JobRepository;

impl JobRepository {
    pub async fn create(conn: &Connection, job: &Job) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO jobs (
                id, user_id, status, file_path, original_filename, raw_ocr_text,
                extracted_fields, field_confidence, warnings, error_message,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
            )
            "#,
            params![
                job.id.clone(),
                job.user_id.clone(),
                job.status.to_string(),
                job.file_path.clone(),
                job.original_filename.clone(),
                job.raw_ocr_text.clone(),
                Self::to_json_opt(&job.extracted_fields)?,
                Self::to_json_opt(&job.field_confidence)?,
                Self::to_json_opt(&job.warnings)?,
                job.error_message.clone(),
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Job>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, user_id, status, file_path, original_filename, raw_ocr_text,
                       extracted_fields, field_confidence, warnings, error_message,
                       created_at, updated_at
                FROM jobs WHERE id = ?1
                "#,
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_job(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn update(conn: &Connection, job: &Job) -> Result<()> {
        conn.execute(
            r#"
            UPDATE jobs SET
                status = ?2,
                raw_ocr_text = ?3,
                extracted_fields = ?4,
                field_confidence = ?5,
                warnings = ?6,
                error_message = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                job.id.clone(),
                job.status.to_string(),
                job.raw_ocr_text.clone(),
                Self::to_json_opt(&job.extracted_fields)?,
                Self::to_json_opt(&job.field_confidence)?,
                Self::to_json_opt(&job.warnings)?,
                job.error_message.clone(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    /// Atomically claim the oldest queued job, transitioning it to
    /// `processing`. The update is conditional on the status still being
    /// `queued`, so at most one claimant wins; losing the race reads as
    /// "no job available this cycle".
    pub async fn claim_next_queued(conn: &Connection) -> Result<Option<String>> {
        let mut rows = conn
            .query(
                "SELECT id FROM jobs WHERE status = 'queued' ORDER BY created_at ASC, id ASC LIMIT 1",
                (),
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let id: String = row.get(0)?;

        let changed = conn
            .execute(
                "UPDATE jobs SET status = 'processing', updated_at = ?2 WHERE id = ?1 AND status = 'queued'",
                params![id.clone(), Utc::now().to_rfc3339()],
            )
            .await?;

        if changed == 1 {
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    pub async fn list_by_user(conn: &Connection, user_id: &str) -> Result<Vec<Job>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, user_id, status, file_path, original_filename, raw_ocr_text,
                       extracted_fields, field_confidence, warnings, error_message,
                       created_at, updated_at
                FROM jobs WHERE user_id = ?1 ORDER BY created_at DESC
                "#,
                params![user_id],
            )
            .await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(Self::row_to_job(&row)?);
        }
        Ok(jobs)
    }

    pub async fn append_log(conn: &Connection, entry: &JobLogEntry) -> Result<()> {
        conn.execute(
            "INSERT INTO job_logs (job_id, step, message, ts) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.job_id.clone(),
                entry.step.clone(),
                entry.message.clone(),
                entry.ts.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn list_logs(conn: &Connection, job_id: &str) -> Result<Vec<JobLogEntry>> {
        let mut rows = conn
            .query(
                "SELECT job_id, step, message, ts FROM job_logs WHERE job_id = ?1 ORDER BY id ASC",
                params![job_id],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::row_to_log(&row)?);
        }
        Ok(entries)
    }

    pub async fn latest_log(conn: &Connection, job_id: &str) -> Result<Option<JobLogEntry>> {
        let mut rows = conn
            .query(
                "SELECT job_id, step, message, ts FROM job_logs WHERE job_id = ?1 ORDER BY id DESC LIMIT 1",
                params![job_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_log(&row)?))
        } else {
            Ok(None)
        }
    }

    fn to_json_opt<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
        value
            .as_ref()
            .map(|v| serde_json::to_string(v).map_err(Into::into))
            .transpose()
    }

    fn from_json_opt<T: serde::de::DeserializeOwned>(value: Option<String>) -> Option<T> {
        value.and_then(|v| serde_json::from_str(&v).ok())
    }

    fn row_to_job(row: &libsql::Row) -> Result<Job> {
        Ok(Job {
            id: row.get(0)?,
            user_id: row.get(1)?,
            status: row
                .get::<String>(2)?
                .parse()
                .unwrap_or(JobStatus::Failed),
            file_path: row.get(3)?,
            original_filename: row.get(4)?,
            raw_ocr_text: row.get(5)?,
            extracted_fields: Self::from_json_opt(row.get(6)?),
            field_confidence: Self::from_json_opt(row.get(7)?),
            warnings: Self::from_json_opt(row.get(8)?),
            error_message: row.get(9)?,
            created_at: Self::parse_ts(&row.get::<String>(10)?),
            updated_at: Self::parse_ts(&row.get::<String>(11)?),
        })
    }

    fn row_to_log(row: &libsql::Row) -> Result<JobLogEntry> {
        Ok(JobLogEntry {
            job_id: row.get(0)?,
            step: row.get(1)?,
            message: row.get(2)?,
            ts: Self::parse_ts(&row.get::<String>(3)?),
        })
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}
