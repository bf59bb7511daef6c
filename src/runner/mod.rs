//! Batch runner: the sequential state machine that drives queued jobs
//! through the [`FormatService`].
//!
//! # States
//!
//! ```text
//!            start (pending jobs)              no pending jobs left
//!   Idle ─────────────────────────▶ Running ──────────────────────────▶ Idle
//!                                    │  ▲
//!             pause / cancel         │  │ resume
//!             (job in flight)        ▼  │
//!                                 Draining ──(job settles)──▶ Paused | Idle
//! ```
//!
//! A pause or cancel never aborts the request in flight. It only stops the
//! next pending job from starting. `JobQueue::clear` sends the runner back to
//! `Idle` from any state.
//!
//! The runner is driven by [`BatchRunner::tick`], which processes at most one
//! job. [`BatchRunner::run`] is a loop of ticks for callers that just want the
//! batch to finish. A single semaphore permit guarantees at most one job is in
//! flight even if several tasks drive the same runner.

use crate::metrics::Metrics;
use crate::models::{Job, JobId, JobPatch, JobStatus};
use crate::queue::{JobQueue, QueueError};
use crate::services::{FormatService, TransportError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{Semaphore, broadcast};

/// Maximum number of format requests in flight at once
pub const MAX_IN_FLIGHT_FORMAT_REQUESTS: usize = 1;

/// Progress written once the source document is on the service
pub const UPLOADED_PROGRESS: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    Idle,
    Running,
    Paused,

    /// Finishing the in-flight job before settling into `Paused` or `Idle`
    Draining,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Draining => "draining",
        };
        f.write_str(s)
    }
}

/// Events emitted by the runner
#[derive(Clone, Debug, PartialEq)]
pub enum RunnerEvent {
    StateChanged { from: RunnerState, to: RunnerState },
    JobStarted { id: JobId },
    JobFinished { id: JobId, status: JobStatus },
}

/// What a single [`BatchRunner::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One job was driven to a terminal state
    Processed { id: JobId, status: JobStatus },

    /// The job was removed by a queue clear while in flight
    Dropped { id: JobId },

    /// The runner was not running; nothing was started
    NotRunning(RunnerState),

    /// No pending job was left; the runner went idle
    Exhausted,
}

/// Totals of one [`BatchRunner::run`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
    pub final_state: RunnerState,
}

#[derive(Debug)]
struct Control {
    state: RunnerState,

    /// State to enter once the in-flight job settles (only read while draining)
    settle_to: RunnerState,

    /// Last queue generation seen
    generation: u64,

    in_flight: Option<JobId>,
}

/// Sequential batch processor over a shared [`JobQueue`]
///
/// Cloning yields another handle to the same runner, so a UI or a signal
/// handler can call [`pause`](Self::pause) or [`cancel`](Self::cancel) while
/// another task is inside [`run`](Self::run).
#[derive(Clone)]
pub struct BatchRunner {
    queue: JobQueue,
    service: Arc<dyn FormatService>,
    control: Arc<Mutex<Control>>,
    permit: Arc<Semaphore>,
    metrics: Arc<Metrics>,
    event_tx: broadcast::Sender<RunnerEvent>,
}

impl BatchRunner {
    pub fn new(queue: JobQueue, service: Arc<dyn FormatService>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let control = Control {
            state: RunnerState::Idle,
            settle_to: RunnerState::Idle,
            generation: queue.generation(),
            in_flight: None,
        };

        Self {
            queue,
            service,
            control: Arc::new(Mutex::new(control)),
            permit: Arc::new(Semaphore::new(MAX_IN_FLIGHT_FORMAT_REQUESTS)),
            metrics: Arc::new(Metrics::new()),
            event_tx,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.event_tx.subscribe()
    }

    /// Lock the control block, first applying any queue clear that happened
    /// since the last look.
    fn lock(&self) -> MutexGuard<'_, Control> {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = self.queue.generation();
        if control.generation != generation {
            control.generation = generation;
            if control.state != RunnerState::Idle {
                tracing::info!("Queue was cleared, runner returning to idle");
                self.transition(&mut control, RunnerState::Idle);
            }
        }

        control
    }

    fn transition(&self, control: &mut Control, to: RunnerState) {
        let from = control.state;
        if from == to {
            return;
        }

        control.state = to;
        tracing::debug!("Runner {} -> {}", from, to);
        self.metrics.record_state_transition();
        let _ = self.event_tx.send(RunnerEvent::StateChanged { from, to });
    }

    fn emit(&self, event: RunnerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Current state
    pub fn state(&self) -> RunnerState {
        self.lock().state
    }

    /// Id of the job currently being processed
    pub fn in_flight(&self) -> Option<JobId> {
        self.lock().in_flight
    }

    /// Begin processing. From `Idle` this requires at least one pending job;
    /// from `Paused` it behaves like [`resume`](Self::resume).
    pub fn start(&self) -> RunnerState {
        let mut control = self.lock();

        match control.state {
            RunnerState::Idle => {
                let pending = self.queue.pending_count();
                if pending == 0 {
                    tracing::info!("Nothing to start: no pending jobs");
                } else {
                    tracing::info!("Starting batch of {} pending job(s)", pending);
                    self.transition(&mut control, RunnerState::Running);
                }
            }
            RunnerState::Paused => self.resume_locked(&mut control),
            RunnerState::Draining => {
                tracing::info!("Start requested while draining, staying in running");
                self.transition(&mut control, RunnerState::Running);
            }
            RunnerState::Running => {}
        }

        control.state
    }

    /// Stop after the current job. Returns the new state (`Draining` when a
    /// job is still in flight, `Paused` otherwise).
    pub fn pause(&self) -> RunnerState {
        let mut control = self.lock();

        if control.state == RunnerState::Running {
            if let Some(id) = control.in_flight {
                tracing::info!("Pause requested, finishing job {} first", id);
                control.settle_to = RunnerState::Paused;
                self.transition(&mut control, RunnerState::Draining);
            } else {
                tracing::info!("Runner paused");
                self.transition(&mut control, RunnerState::Paused);
            }
        }

        control.state
    }

    /// Continue with the next pending job.
    pub fn resume(&self) -> RunnerState {
        let mut control = self.lock();
        self.resume_locked(&mut control);
        control.state
    }

    fn resume_locked(&self, control: &mut Control) {
        match control.state {
            RunnerState::Paused => {
                if self.queue.pending_count() > 0 {
                    tracing::info!("Runner resumed");
                    self.transition(control, RunnerState::Running);
                } else {
                    tracing::info!("Resume with no pending jobs, going idle");
                    self.transition(control, RunnerState::Idle);
                }
            }
            RunnerState::Draining if control.settle_to == RunnerState::Paused => {
                tracing::info!("Pause withdrawn before the current job settled");
                self.transition(control, RunnerState::Running);
            }
            _ => {}
        }
    }

    /// Stop processing the remaining jobs. The in-flight job (if any) still
    /// finishes; unprocessed jobs stay pending.
    pub fn cancel(&self) -> RunnerState {
        let mut control = self.lock();

        match control.state {
            RunnerState::Running if control.in_flight.is_some() => {
                tracing::info!("Cancel requested, finishing the current job first");
                control.settle_to = RunnerState::Idle;
                self.transition(&mut control, RunnerState::Draining);
            }
            RunnerState::Running | RunnerState::Paused => {
                tracing::info!("Runner cancelled");
                self.transition(&mut control, RunnerState::Idle);
            }
            RunnerState::Draining => {
                control.settle_to = RunnerState::Idle;
            }
            RunnerState::Idle => {}
        }

        control.state
    }

    /// Process at most one job.
    ///
    /// Claims the earliest pending job, uploads it unless it is already on the
    /// service, formats it with its configuration snapshot and writes the
    /// terminal status back into the queue. A failed job never stops the batch.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_permit) = self.permit.acquire().await else {
            return TickOutcome::NotRunning(self.state());
        };

        let job = {
            let mut control = self.lock();
            if control.state != RunnerState::Running {
                return TickOutcome::NotRunning(control.state);
            }

            match self.queue.claim_next_pending() {
                Some(job) => {
                    control.in_flight = Some(job.id);
                    job
                }
                None => {
                    tracing::info!("No pending jobs left, runner going idle");
                    self.transition(&mut control, RunnerState::Idle);
                    return TickOutcome::Exhausted;
                }
            }
        };

        self.metrics.record_tick();
        tracing::info!("Processing {} (job {})", job.file.name, job.id);
        self.emit(RunnerEvent::JobStarted { id: job.id });

        let started = Instant::now();
        let outcome = match self.process(&job).await {
            Ok(Some(result_handle)) => {
                tracing::info!("Completed {} -> {}", job.file.name, result_handle);
                let written = self.write(job.id, JobPatch::completed(result_handle));
                if written {
                    self.metrics.record_job_completed(started.elapsed());
                }
                written.then_some(JobStatus::Completed)
            }
            Ok(None) => None,
            Err(err) => {
                let unavailable = matches!(err, TransportError::Unavailable(_));
                tracing::error!("Failed to format {}: {}", job.file.name, err);
                let written = self.write(job.id, JobPatch::failed(err.to_string()));
                if written {
                    self.metrics.record_job_failed(started.elapsed(), unavailable);
                }
                written.then_some(JobStatus::Failed)
            }
        };

        if let Some(status) = outcome {
            self.emit(RunnerEvent::JobFinished { id: job.id, status });
        }
        self.settle();

        match outcome {
            Some(status) => TickOutcome::Processed { id: job.id, status },
            None => TickOutcome::Dropped { id: job.id },
        }
    }

    /// Upload (if needed) and format one job. `Ok(None)` means the job left
    /// the queue while it was being processed.
    async fn process(&self, job: &Job) -> Result<Option<String>, TransportError> {
        let file_id = match &job.remote_file_id {
            Some(file_id) => file_id.clone(),
            None => self.service.upload(&job.file).await?.file_id,
        };

        if !self.write(job.id, JobPatch::uploaded(file_id.clone(), UPLOADED_PROGRESS)) {
            return Ok(None);
        }

        let formatted = self
            .service
            .format(&file_id, &job.config_snapshot)
            .await?;
        Ok(Some(formatted.file_id))
    }

    /// Write a patch into the queue. Returns false if the job is gone.
    fn write(&self, id: JobId, patch: JobPatch) -> bool {
        match self.queue.update_status(id, patch) {
            Ok(()) => true,
            Err(QueueError::NotFound(_)) => {
                tracing::debug!("Job {} was cleared while in flight, dropping update", id);
                self.metrics.record_stale_update();
                false
            }
            Err(err) => {
                tracing::warn!("Could not update job {}: {}", id, err);
                false
            }
        }
    }

    /// Release the in-flight slot and settle draining or exhausted states.
    fn settle(&self) {
        let mut control = self.lock();
        control.in_flight = None;

        match control.state {
            RunnerState::Draining => {
                let target = match control.settle_to {
                    RunnerState::Paused if self.queue.pending_count() == 0 => RunnerState::Idle,
                    target => target,
                };
                tracing::info!("Current job settled, runner now {}", target);
                self.transition(&mut control, target);
            }
            RunnerState::Running if self.queue.pending_count() == 0 => {
                tracing::info!("All jobs processed, runner going idle");
                self.transition(&mut control, RunnerState::Idle);
            }
            _ => {}
        }
    }

    /// Tick until the runner stops running.
    pub async fn run(&self) -> RunReport {
        let mut completed = 0;
        let mut failed = 0;

        loop {
            match self.tick().await {
                TickOutcome::Processed { status, .. } => match status {
                    JobStatus::Completed => completed += 1,
                    _ => failed += 1,
                },
                TickOutcome::Dropped { .. } => {}
                TickOutcome::NotRunning(_) | TickOutcome::Exhausted => break,
            }
        }

        let final_state = self.state();
        tracing::info!(
            "Batch run ended in state {}: {} completed, {} failed",
            final_state,
            completed,
            failed
        );

        RunReport {
            completed,
            failed,
            final_state,
        }
    }
}
