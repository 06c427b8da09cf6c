//! The job runner: drives every job from `queued` to a terminal state,
//! exactly once, with durable progress after each step.

mod dispatch;
mod event_bus;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use dispatch::{PollingSource, QueueSource, WorkSource};
pub use event_bus::{EventBus, Subscription, SubscriptionId};

use crate::config::{Config, DispatchMode, OcrConfig, WorkerConfig};
use crate::db::DatabaseBackend;
use crate::error::{PoscanError, Result};
use crate::extraction;
use crate::models::{ExtractedFields, Job, JobLogEntry, JobStatus, PoRecord, ProgressEvent};
use crate::ocr::{preprocess_image, TextExtractor};

/// Optional metadata attached to a transition's progress event.
#[derive(Debug, Default)]
struct StepExtra {
    engine: Option<String>,
    ocr_duration_ms: Option<u64>,
    total_duration_ms: Option<u64>,
}

pub struct JobRunner {
    db: Arc<dyn DatabaseBackend>,
    ocr: Arc<dyn TextExtractor>,
    bus: EventBus,
    worker: WorkerConfig,
    ocr_config: OcrConfig,
    queue_tx: mpsc::UnboundedSender<String>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    started: AtomicBool,
}

impl JobRunner {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        ocr: Arc<dyn TextExtractor>,
        bus: EventBus,
        config: &Config,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            db,
            ocr,
            bus,
            worker: config.worker.clone(),
            ocr_config: config.ocr.clone(),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            started: AtomicBool::new(false),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Make a queued job visible to an in-process worker. No-op under the
    /// polling execution model, where workers claim from the store.
    pub fn enqueue(&self, job_id: &str) {
        if self.worker.dispatch != DispatchMode::Queue {
            debug!(job_id = %job_id, "Queue dispatch disabled; job will be claimed by a polling worker");
            return;
        }
        if self.queue_tx.send(job_id.to_string()).is_err() {
            warn!(job_id = %job_id, "Job queue closed; job will not be picked up");
        }
    }

    /// Launch the worker loops under the configured execution mode.
    /// Errors when called twice within one process lifetime.
    pub async fn start(self: &Arc<Self>, cancel: &CancellationToken) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PoscanError::Internal(
                "job runner already started".to_string(),
            ));
        }

        let source: Arc<dyn WorkSource> = match self.worker.dispatch {
            DispatchMode::Queue => {
                let rx = self.queue_rx.lock().await.take().ok_or_else(|| {
                    PoscanError::Internal("job queue receiver already taken".to_string())
                })?;
                Arc::new(QueueSource::new(rx))
            }
            DispatchMode::Polling => Arc::new(PollingSource::new(
                self.db.clone(),
                self.worker.poll_interval_ms,
            )),
        };

        for worker_id in 0..self.worker.count.max(1) {
            let runner = Arc::clone(self);
            let source = Arc::clone(&source);
            let token = cancel.child_token();
            tokio::spawn(async move {
                info!(worker_id, "Worker started");
                loop {
                    let Some(job_id) = source.acquire(&token).await else {
                        break;
                    };
                    // A single job's failure is finalized on the job
                    // itself; the loop moves on to the next item.
                    if let Err(e) = runner.process_job(&job_id).await {
                        error!(job_id = %job_id, "Job finished with error: {e}");
                    }
                }
                info!(worker_id, "Worker stopped");
            });
        }

        Ok(())
    }

    /// Run the full pipeline for one job. On every exit path the job is
    /// left in a terminal state with a matching log entry and progress
    /// event; the returned error is informational for the worker loop.
    pub async fn process_job(&self, job_id: &str) -> Result<()> {
        let overall = Instant::now();

        let mut job = self
            .db
            .get_job(job_id)
            .await?
            .ok_or_else(|| PoscanError::NotFound(format!("Job {job_id} not found")))?;

        if job.status.is_terminal() {
            warn!(job_id = %job.id, status = %job.status, "Job already terminal; skipping");
            return Ok(());
        }

        match self.run_pipeline(&mut job, overall).await {
            Ok(()) => Ok(()),
            Err(e) => {
                job.error_message = Some(e.to_string());
                self.step(&mut job, JobStatus::Failed, &e.to_string(), None)
                    .await?;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, job: &mut Job, overall: Instant) -> Result<()> {
        // Polling workers arrive with the claim having already moved the
        // job to `processing`; the queue path transitions here.
        if job.status != JobStatus::Processing {
            self.step(job, JobStatus::Processing, "loading and preprocessing image", None)
                .await?;
        }

        let bytes = tokio::fs::read(&job.file_path)
            .await
            .map_err(|_| PoscanError::Processing("Corrupted or unreadable image".to_string()))?;
        let image = preprocess_image(&bytes, &self.ocr_config)?;

        self.step(job, JobStatus::Extracting, "running OCR inference", None)
            .await?;
        let ocr_started = Instant::now();
        let ocr = tokio::time::timeout(
            Duration::from_secs(self.ocr_config.timeout_secs),
            self.ocr.extract(&image),
        )
        .await
        .map_err(|_| {
            PoscanError::Ocr(format!(
                "OCR timed out after {} seconds",
                self.ocr_config.timeout_secs
            ))
        })??;
        let ocr_ms = ocr_started.elapsed().as_millis() as u64;

        self.diagnostic(job, &format!("ocr engine={}", ocr.engine)).await?;
        self.diagnostic(job, &format!("ocr duration_ms={ocr_ms}")).await?;
        if let Some(note) = &ocr.note {
            self.diagnostic(job, note).await?;
        }

        self.step(job, JobStatus::Validating, "parsing and validating structured data", None)
            .await?;
        let (fields, confidence, mut warnings) = extraction::parse_po_text(&ocr.raw_text);
        fields.validate()?;

        if let Some(note) = ocr.note.clone() {
            warnings.insert(0, note);
        }

        job.raw_ocr_text = Some(ocr.raw_text.clone());
        job.extracted_fields = Some(fields.clone());
        job.field_confidence = Some(confidence);
        job.warnings = Some(warnings);
        job.updated_at = Utc::now();
        self.db.update_job(job).await?;

        if self.worker.auto_save {
            self.step(job, JobStatus::Saving, "auto-save enabled, persisting record", None)
                .await?;
            self.save_record(&job.id, &fields).await?;
        }

        let total_ms = overall.elapsed().as_millis() as u64;
        self.step(
            job,
            JobStatus::Done,
            "ocr complete",
            Some(StepExtra {
                engine: Some(ocr.engine),
                ocr_duration_ms: Some(ocr_ms),
                total_duration_ms: Some(total_ms),
            }),
        )
        .await?;

        Ok(())
    }

    /// Upsert the confirmed record for a job. Returns `true` when the
    /// record was created, `false` when an existing one was replaced.
    pub async fn save_record(&self, job_id: &str, fields: &ExtractedFields) -> Result<bool> {
        let record = PoRecord::from_fields(job_id, fields);
        self.db.upsert_record(&record).await
    }

    /// Apply one state transition: persist the job, append exactly one
    /// log entry, publish exactly one progress event.
    async fn step(
        &self,
        job: &mut Job,
        status: JobStatus,
        message: &str,
        extra: Option<StepExtra>,
    ) -> Result<()> {
        job.status = status;
        job.updated_at = Utc::now();
        self.db.update_job(job).await?;
        self.db
            .append_log(&JobLogEntry::new(&job.id, &status.to_string(), message))
            .await?;
        info!(job_id = %job.id, step = %status, message = %message, "Job step");

        let mut event = ProgressEvent::new(status, message);
        if let Some(extra) = extra {
            event.engine = extra.engine;
            event.ocr_duration_ms = extra.ocr_duration_ms;
            event.total_duration_ms = extra.total_duration_ms;
        }
        self.bus.publish(&job.id, event).await;

        Ok(())
    }

    /// Append a diagnostic note under the job's current step, without a
    /// state transition or progress event.
    async fn diagnostic(&self, job: &Job, message: &str) -> Result<()> {
        self.db
            .append_log(&JobLogEntry::new(&job.id, &job.status.to_string(), message))
            .await
    }
}
