//! Integration tests for BatchRunner driving a shared JobQueue
//!
//! These tests verify that the runner:
//! - Processes jobs strictly in queue order
//! - Keeps going after a failed job
//! - Lets the in-flight job finish on pause, cancel and clear
//! - Never has more than one request in flight

mod common;

use common::{FakeFormatService, docs};
use docfmt::models::{ConfigModel, JobStatus, SectionKind};
use docfmt::queue::{JobQueue, QueueError};
use docfmt::runner::{BatchRunner, RunnerEvent, RunnerState, UPLOADED_PROGRESS};
use tokio::time::{Duration, timeout};

const WAIT: Duration = Duration::from_secs(5);

fn queue_with(names: &[&str]) -> (JobQueue, Vec<docfmt::JobId>) {
    let queue = JobQueue::new();
    let ids = queue.add(docs(names), &ConfigModel::empty()).accepted;
    (queue, ids)
}

#[tokio::test]
async fn test_jobs_processed_in_insertion_order() {
    let fake = FakeFormatService::new();
    // Insertion order deliberately differs from name order
    let (queue, ids) = queue_with(&["zeta.docx", "alpha.docx", "mid.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    assert_eq!(runner.start(), RunnerState::Running);
    let report = runner.run().await;

    assert_eq!(report.completed, 3);
    assert_eq!(report.final_state, RunnerState::Idle);
    assert_eq!(
        fake.calls(),
        vec![
            "upload:zeta.docx",
            "format:zeta.docx",
            "upload:alpha.docx",
            "format:alpha.docx",
            "upload:mid.docx",
            "format:mid.docx",
        ]
    );

    for id in ids {
        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.finished_at.is_some());
    }
}

#[tokio::test]
async fn test_partial_failure_does_not_halt_batch() {
    let fake = FakeFormatService::new();
    fake.fail_format("b.docx");
    let (queue, ids) = queue_with(&["a.docx", "b.docx", "c.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let report = runner.run().await;

    assert_eq!((report.completed, report.failed), (2, 1));

    let statuses: Vec<JobStatus> = ids.iter().map(|id| queue.get(*id).unwrap().status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Completed, JobStatus::Failed, JobStatus::Completed]
    );

    let b = queue.get(ids[1]).unwrap();
    assert_eq!(b.progress, UPLOADED_PROGRESS);
    assert!(b.error.unwrap().contains("b.docx is corrupt"));
    assert!(b.result_handle.is_none());
}

#[tokio::test]
async fn test_unreachable_service_fails_each_job() {
    let fake = FakeFormatService::new();
    fake.go_offline();
    let (queue, ids) = queue_with(&["a.docx", "b.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let report = runner.run().await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.final_state, RunnerState::Idle);
    for id in ids {
        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 0);
        assert!(job.error.unwrap().contains("unavailable"));
    }
}

#[tokio::test]
async fn test_pause_while_processing_lets_job_finish() {
    let fake = FakeFormatService::new();
    let gate = fake.gate("b.docx");
    let (queue, ids) = queue_with(&["a.docx", "b.docx", "c.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();
    assert_eq!(queue.get(ids[1]).unwrap().status, JobStatus::Processing);
    assert_eq!(runner.in_flight(), Some(ids[1]));

    assert_eq!(runner.pause(), RunnerState::Draining);
    gate.release.notify_one();

    let report = timeout(WAIT, driver).await.unwrap().unwrap();
    assert_eq!(report.final_state, RunnerState::Paused);
    assert_eq!(queue.get(ids[1]).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get(ids[2]).unwrap().status, JobStatus::Pending);

    // Resume continues with the next pending job
    assert_eq!(runner.resume(), RunnerState::Running);
    let report = runner.run().await;
    assert_eq!(report.completed, 1);
    assert_eq!(queue.get(ids[2]).unwrap().status, JobStatus::Completed);
    assert_eq!(fake.formatted_names(), vec!["a.docx", "b.docx", "c.docx"]);
}

#[tokio::test]
async fn test_cancel_leaves_remaining_jobs_pending() {
    let fake = FakeFormatService::new();
    let gate = fake.gate("a.docx");
    let (queue, ids) = queue_with(&["a.docx", "b.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();
    assert_eq!(runner.cancel(), RunnerState::Draining);
    gate.release.notify_one();

    let report = timeout(WAIT, driver).await.unwrap().unwrap();
    assert_eq!(report.final_state, RunnerState::Idle);
    assert_eq!(queue.get(ids[0]).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get(ids[1]).unwrap().status, JobStatus::Pending);

    // A cancelled batch can be started again
    assert_eq!(runner.start(), RunnerState::Running);
}

#[tokio::test]
async fn test_processing_job_cannot_be_removed() {
    let fake = FakeFormatService::new();
    let gate = fake.gate("a.docx");
    let (queue, ids) = queue_with(&["a.docx", "b.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();

    assert_eq!(
        queue.remove(ids[0]),
        Err(QueueError::InvalidState {
            job_id: ids[0],
            status: JobStatus::Processing
        })
    );
    // The pending job can still be removed
    assert!(queue.remove(ids[1]).is_ok());

    gate.release.notify_one();
    let report = timeout(WAIT, driver).await.unwrap().unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_clear_during_processing_returns_to_idle() {
    let fake = FakeFormatService::new();
    let gate = fake.gate("a.docx");
    let (queue, _) = queue_with(&["a.docx", "b.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();
    assert_eq!(queue.clear(), 2);
    assert_eq!(runner.state(), RunnerState::Idle);

    gate.release.notify_one();
    let report = timeout(WAIT, driver).await.unwrap().unwrap();

    assert_eq!(report.final_state, RunnerState::Idle);
    assert_eq!(report.completed, 0);
    assert!(queue.is_empty());
    // b.docx was never started
    assert_eq!(fake.formatted_names(), vec!["a.docx"]);
}

#[tokio::test]
async fn test_job_keeps_config_snapshot_from_enqueue_time() {
    let fake = FakeFormatService::new();
    let queue = JobQueue::new();

    let mut working = ConfigModel::empty();
    working.set(SectionKind::Text, "font_family", "Calibri");
    queue.add(docs(&["first.docx"]), &working);

    // Later edits only affect jobs added afterwards
    working.set(SectionKind::Text, "font_family", "Garamond");
    queue.add(docs(&["second.docx"]), &working);

    let runner = BatchRunner::new(queue.clone(), fake.clone());
    runner.start();
    runner.run().await;

    let first = fake.options_for("first.docx").unwrap();
    let second = fake.options_for("second.docx").unwrap();
    assert_eq!(
        first.get(SectionKind::Text, "font_family").unwrap().to_string(),
        "Calibri"
    );
    assert_eq!(
        second.get(SectionKind::Text, "font_family").unwrap().to_string(),
        "Garamond"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_drivers_keep_single_request_in_flight() {
    let fake = FakeFormatService::new();
    let names: Vec<String> = (0..8).map(|i| format!("doc{}.docx", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let queue = JobQueue::with_limits(docfmt::QueueLimits {
        max_jobs: 8,
        ..Default::default()
    });
    queue.add(docs(&names), &ConfigModel::empty());

    let runner = BatchRunner::new(queue.clone(), fake.clone());
    runner.start();

    let drivers: Vec<_> = (0..3)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run().await })
        })
        .collect();

    let mut completed = 0;
    for driver in drivers {
        completed += timeout(WAIT, driver).await.unwrap().unwrap().completed;
    }

    assert_eq!(completed, 8);
    assert_eq!(fake.max_in_flight(), 1);
    assert_eq!(queue.counts().completed, 8);
}

#[tokio::test]
async fn test_runner_events_follow_state_machine() {
    let fake = FakeFormatService::new();
    let (queue, ids) = queue_with(&["a.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());
    let mut rx = runner.subscribe();

    runner.start();
    runner.run().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.first(), Some(&RunnerEvent::StateChanged {
        from: RunnerState::Idle,
        to: RunnerState::Running,
    }));
    assert!(events.contains(&RunnerEvent::JobFinished {
        id: ids[0],
        status: JobStatus::Completed,
    }));
    assert_eq!(events.last(), Some(&RunnerEvent::StateChanged {
        from: RunnerState::Running,
        to: RunnerState::Idle,
    }));
}

#[tokio::test]
async fn test_pause_on_last_job_settles_idle() {
    let fake = FakeFormatService::new();
    let gate = fake.gate("only.docx");
    let (queue, ids) = queue_with(&["only.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();
    assert_eq!(runner.pause(), RunnerState::Draining);
    gate.release.notify_one();

    let report = timeout(WAIT, driver).await.unwrap().unwrap();
    assert_eq!(report.final_state, RunnerState::Idle);
    assert_eq!(queue.get(ids[0]).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_failure_after_clear_is_not_counted() {
    let fake = FakeFormatService::new();
    fake.fail_format("a.docx");
    let gate = fake.gate("a.docx");
    let (queue, _) = queue_with(&["a.docx"]);
    let runner = BatchRunner::new(queue.clone(), fake.clone());

    runner.start();
    let driver = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run().await }
    });

    timeout(WAIT, gate.entered.notified()).await.unwrap();
    queue.clear();
    gate.release.notify_one();

    let report = timeout(WAIT, driver).await.unwrap().unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(runner.metrics().failed(), 0);
    assert_eq!(
        runner
            .metrics()
            .stale_updates
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}
