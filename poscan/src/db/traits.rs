use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Job, JobLogEntry, PoRecord};

/// Job rows and their append-only logs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<()>;
    async fn get_job(&self, id: &str) -> Result<Option<Job>>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    /// Atomic claim of the oldest queued job; `None` when nothing is
    /// queued or this claimant lost the race.
    async fn claim_next_queued(&self) -> Result<Option<String>>;
    async fn list_jobs_by_user(&self, user_id: &str) -> Result<Vec<Job>>;
    async fn append_log(&self, entry: &JobLogEntry) -> Result<()>;
    async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogEntry>>;
    async fn latest_log(&self, job_id: &str) -> Result<Option<JobLogEntry>>;
}

/// Confirmed purchase-order records, unique per job.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns `true` when a new record was created, `false` on replace.
    async fn upsert_record(&self, record: &PoRecord) -> Result<bool>;
    async fn get_record_by_job_id(&self, job_id: &str) -> Result<Option<PoRecord>>;
}

/// Combined backend surface consumed as `Arc<dyn DatabaseBackend>`.
pub trait DatabaseBackend: JobStore + RecordStore {}

impl<T: JobStore + RecordStore> DatabaseBackend for T {}
