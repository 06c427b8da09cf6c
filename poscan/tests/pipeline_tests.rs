mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use poscan::config::DispatchMode;
use poscan::db::{Database, DatabaseBackend, LibSqlBackend};
use poscan::models::{Job, JobStatus};
use poscan::runner::{EventBus, JobRunner};

use common::{init_test_logger, test_config, write_test_image, StalledExtractor, StubExtractor};

const GOOD_PO_TEXT: &str = "PO Number: PO-TEST-001\n\
PO Date: 2025-03-04\n\
Buyer: Acme Co.,Ltd\n\
Sub Total: 1000.00\n\
VAT 7%: 70.00\n\
Grand Total: 1070.00\n\
Widget qty 2 unit pcs unit_price 500 line_total 1000";

const MISMATCHED_PO_TEXT: &str = "PO Number: PO-TEST-002\n\
PO Date: 2025-03-04\n\
Sub Total: 1000.00\n\
Grand Total: 1070.00\n\
Widget qty 2 unit pcs unit_price 600 line_total 1200";

struct TestCtx {
    _temp: TempDir,
    db: Arc<dyn DatabaseBackend>,
    bus: EventBus,
    runner: Arc<JobRunner>,
    image_path: String,
}

async fn setup(auto_save: bool, dispatch: DispatchMode, ocr_text: &str) -> TestCtx {
    init_test_logger();
    let temp = TempDir::new().expect("create temp dir");
    let config = test_config(&temp, auto_save, dispatch);
    let raw_db = Database::new(&config.database).await.expect("open database");
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));
    let bus = EventBus::new();
    let runner = Arc::new(JobRunner::new(
        db.clone(),
        Arc::new(StubExtractor::returning(ocr_text)),
        bus.clone(),
        &config,
    ));
    let image_path = write_test_image(&temp, "po.png");
    TestCtx {
        _temp: temp,
        db,
        bus,
        runner,
        image_path,
    }
}

async fn queue_job(ctx: &TestCtx, id: &str) -> Job {
    let job = Job::new(
        id.to_string(),
        "demo".to_string(),
        ctx.image_path.clone(),
        "po.png".to_string(),
    );
    ctx.db.create_job(&job).await.expect("create job");
    job
}

/// Distinct step names from the log, in first-seen order.
async fn transition_steps(ctx: &TestCtx, id: &str) -> Vec<String> {
    let logs = ctx.db.list_logs(id).await.expect("list logs");
    let mut steps = Vec::new();
    for entry in logs {
        if steps.last() != Some(&entry.step) {
            steps.push(entry.step);
        }
    }
    steps
}

#[tokio::test]
async fn pipeline_reaches_done_and_auto_saves() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-1").await;

    ctx.runner.process_job("job-1").await.expect("process job");

    let job = ctx.db.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.error_message.is_none());

    let fields = job.extracted_fields.expect("fields extracted");
    assert_eq!(fields.po_number.as_deref(), Some("PO-TEST-001"));
    assert_eq!(fields.sub_total, Some(1000.0));
    assert_eq!(fields.grand_total, Some(1070.0));
    assert_eq!(fields.items.len(), 1);

    assert_eq!(
        transition_steps(&ctx, "job-1").await,
        vec!["processing", "extracting", "validating", "saving", "done"]
    );

    let record = ctx
        .db
        .get_record_by_job_id("job-1")
        .await
        .unwrap()
        .expect("record auto-saved");
    assert_eq!(record.data.po_number.as_deref(), Some("PO-TEST-001"));
}

#[tokio::test]
async fn pipeline_skips_saving_when_auto_save_disabled() {
    let ctx = setup(false, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-2").await;

    ctx.runner.process_job("job-2").await.expect("process job");

    let job = ctx.db.get_job("job-2").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(
        transition_steps(&ctx, "job-2").await,
        vec!["processing", "extracting", "validating", "done"]
    );
    assert!(ctx.db.get_record_by_job_id("job-2").await.unwrap().is_none());
}

#[tokio::test]
async fn cross_field_mismatch_fails_the_job() {
    let ctx = setup(true, DispatchMode::Queue, MISMATCHED_PO_TEXT).await;
    queue_job(&ctx, "job-3").await;

    let err = ctx
        .runner
        .process_job("job-3")
        .await
        .expect_err("validation must fail");
    assert!(err.to_string().contains("does not match"));

    let job = ctx.db.get_job("job-3").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("does not match"));
    assert!(ctx.db.get_record_by_job_id("job-3").await.unwrap().is_none());
}

#[tokio::test]
async fn unreadable_file_fails_the_job() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    let job = Job::new(
        "job-4".to_string(),
        "demo".to_string(),
        "/nonexistent/po.png".to_string(),
        "po.png".to_string(),
    );
    ctx.db.create_job(&job).await.expect("create job");

    let err = ctx.runner.process_job("job-4").await.expect_err("must fail");
    assert!(err.to_string().contains("Corrupted or unreadable image"));

    let job = ctx.db.get_job("job-4").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn stalled_ocr_times_out_and_fails_the_job() {
    init_test_logger();
    let temp = TempDir::new().expect("create temp dir");
    let mut config = test_config(&temp, false, DispatchMode::Queue);
    config.ocr.timeout_secs = 1;

    let raw_db = Database::new(&config.database).await.expect("open database");
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));
    let runner = Arc::new(JobRunner::new(
        db.clone(),
        Arc::new(StalledExtractor),
        EventBus::new(),
        &config,
    ));

    let image_path = write_test_image(&temp, "po.png");
    let job = Job::new(
        "job-9".to_string(),
        "demo".to_string(),
        image_path,
        "po.png".to_string(),
    );
    db.create_job(&job).await.expect("create job");

    let err = runner.process_job("job-9").await.expect_err("must time out");
    assert!(err.to_string().contains("timed out"));

    let job = db.get_job("job-9").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .unwrap()
        .contains("OCR timed out after 1 seconds"));
}

#[tokio::test]
async fn terminal_jobs_are_not_reprocessed() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-5").await;
    ctx.runner.process_job("job-5").await.unwrap();

    let before = ctx.db.list_logs("job-5").await.unwrap().len();
    ctx.runner.process_job("job-5").await.expect("no-op succeeds");
    let after = ctx.db.list_logs("job-5").await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn progress_events_are_ordered_and_end_at_100() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-6").await;

    let mut subscription = ctx.bus.subscribe("job-6").await;
    ctx.runner.process_job("job-6").await.unwrap();

    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
            .await
            .expect("event within timeout")
            .expect("bus still open");
        let done = event.progress_percent >= 100;
        events.push(event);
        if done {
            break;
        }
    }

    let percents: Vec<u8> = events.iter().map(|e| e.progress_percent).collect();
    assert_eq!(percents, vec![20, 55, 80, 92, 100]);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    let last = events.last().unwrap();
    assert_eq!(last.status, JobStatus::Done);
    assert_eq!(last.engine.as_deref(), Some("stub"));
    assert!(last.total_duration_ms.is_some());
}

#[tokio::test]
async fn save_record_upsert_is_idempotent() {
    let ctx = setup(false, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-7").await;
    ctx.runner.process_job("job-7").await.unwrap();

    let job = ctx.db.get_job("job-7").await.unwrap().unwrap();
    let fields = job.extracted_fields.unwrap();

    assert!(ctx.runner.save_record("job-7", &fields).await.unwrap());
    assert!(!ctx.runner.save_record("job-7", &fields).await.unwrap());

    let record = ctx.db.get_record_by_job_id("job-7").await.unwrap().unwrap();
    assert_eq!(record.data, fields);
}

#[tokio::test]
async fn queue_workers_drain_enqueued_jobs() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    queue_job(&ctx, "job-8").await;

    let cancel = CancellationToken::new();
    ctx.runner.start(&cancel).await.expect("start workers");
    ctx.runner.enqueue("job-8");

    let mut status = JobStatus::Queued;
    for _ in 0..50 {
        status = ctx.db.get_job("job-8").await.unwrap().unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cancel.cancel();
    assert_eq!(status, JobStatus::Done);
}

#[tokio::test]
async fn runner_cannot_start_twice() {
    let ctx = setup(true, DispatchMode::Queue, GOOD_PO_TEXT).await;
    let cancel = CancellationToken::new();
    ctx.runner.start(&cancel).await.expect("first start");
    assert!(ctx.runner.start(&cancel).await.is_err());
    cancel.cancel();
}

#[tokio::test]
async fn concurrent_claims_never_hand_out_a_job_twice() {
    let ctx = setup(false, DispatchMode::Polling, GOOD_PO_TEXT).await;
    for i in 0..5 {
        queue_job(&ctx, &format!("claim-{i}")).await;
    }
    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = ctx.db.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(id) = db.claim_next_queued().await.expect("claim") {
                claimed.push(id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.expect("join"));
    }
    // Every job claimed, and none claimed twice.
    assert_eq!(all.len(), 5);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 5);

    for i in 0..5 {
        let job = ctx.db.get_job(&format!("claim-{i}")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }
}
