use async_trait::async_trait;

use crate::db::connection::Database;
use crate::db::repository::{JobRepository, RecordRepository};
use crate::db::traits::{JobStore, RecordStore};
use crate::error::Result;
use crate::models::{Job, JobLogEntry, PoRecord};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStore for LibSqlBackend {
    async fn create_job(&self, job: &Job) -> Result<()> {
        let conn = self.db.connect()?;
        JobRepository::create(&conn, job).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.db.connect()?;
        JobRepository::get_by_id(&conn, id).await
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let conn = self.db.connect()?;
        JobRepository::update(&conn, job).await
    }

    async fn claim_next_queued(&self) -> Result<Option<String>> {
        let conn = self.db.connect()?;
        JobRepository::claim_next_queued(&conn).await
    }

    async fn list_jobs_by_user(&self, user_id: &str) -> Result<Vec<Job>> {
        let conn = self.db.connect()?;
        JobRepository::list_by_user(&conn, user_id).await
    }

    async fn append_log(&self, entry: &JobLogEntry) -> Result<()> {
        let conn = self.db.connect()?;
        JobRepository::append_log(&conn, entry).await
    }

    async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogEntry>> {
        let conn = self.db.connect()?;
        JobRepository::list_logs(&conn, job_id).await
    }

    async fn latest_log(&self, job_id: &str) -> Result<Option<JobLogEntry>> {
        let conn = self.db.connect()?;
        JobRepository::latest_log(&conn, job_id).await
    }
}

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn upsert_record(&self, record: &PoRecord) -> Result<bool> {
        let conn = self.db.connect()?;
        RecordRepository::upsert(&conn, record).await
    }

    async fn get_record_by_job_id(&self, job_id: &str) -> Result<Option<PoRecord>> {
        let conn = self.db.connect()?;
        RecordRepository::get_by_job_id(&conn, job_id).await
    }
}
