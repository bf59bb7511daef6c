// Job queue module
//
// This module provides the JobQueue which owns every queued Job behind
// Arc<RwLock<T>> and emits change events for passive observers.

use crate::models::{ConfigModel, DocumentFile, Job, JobId, JobPatch, JobStatus};
use crate::services::validation::{DEFAULT_MAX_FILE_SIZE, ValidationError, validate_document};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::broadcast;

/// Default maximum number of jobs held at once.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;

/// Change events emitted when the job collection is modified
#[derive(Clone, Debug, PartialEq)]
pub enum QueueChange {
    /// Files were offered to the queue
    JobsAdded { ids: Vec<JobId>, rejected: usize },

    /// A pending job was removed by the user
    JobRemoved { id: JobId },

    /// The batch runner wrote a status or progress update
    JobUpdated {
        id: JobId,
        status: JobStatus,
        progress: u8,
    },

    /// Every job was dropped
    Cleared,
}

/// Errors from queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job {job_id} is {status}; only pending jobs can be removed")]
    InvalidState { job_id: JobId, status: JobStatus },

    #[error("Job {0} is not in the queue")]
    NotFound(JobId),
}

/// Admission limits enforced by [`JobQueue::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_jobs: usize,
    pub max_file_size: u64,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_QUEUE_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// A file that was not admitted, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: ValidationError,
}

/// Result of [`JobQueue::add`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    /// Ids of the new jobs, in the order the files were given
    pub accepted: Vec<JobId>,
    pub rejected: Vec<RejectedFile>,
}

impl AddOutcome {
    /// Number of files turned away because the queue was full.
    pub fn rejected_for_capacity(&self) -> usize {
        self.rejected
            .iter()
            .filter(|r| matches!(r.reason, ValidationError::QueueFull { .. }))
            .count()
    }
}

/// Per-status job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    jobs: IndexMap<JobId, Job>,

    /// Incremented by every `clear()`
    generation: u64,
}

/// Thread-safe owner of the job collection
///
/// The queue is the single owner of every [`Job`]. Cloning a `JobQueue`
/// clones the handle, not the jobs, so the runner and any observers all see
/// the same collection.
///
/// # Usage
///
/// - [`add()`](Self::add), [`remove()`](Self::remove), [`clear()`](Self::clear)
///   for user-driven changes
/// - [`snapshot()`](Self::snapshot) and [`read()`](Self::read) for observers
/// - [`subscribe()`](Self::subscribe) for change notifications
///
/// Status writes go through crate-private methods used only by
/// [`BatchRunner`](crate::runner::BatchRunner).
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<RwLock<QueueInner>>,
    limits: QueueLimits,
    change_tx: broadcast::Sender<QueueChange>,
}

impl JobQueue {
    /// Create an empty queue with the default limits
    pub fn new() -> Self {
        Self::with_limits(QueueLimits::default())
    }

    pub fn with_limits(limits: QueueLimits) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(RwLock::new(QueueInner::default())),
            limits,
            change_tx,
        }
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    // Writes never leave a job half-updated, so a poisoned lock is still usable.
    fn read_inner(&self) -> RwLockReadGuard<'_, QueueInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, QueueInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, change: QueueChange) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change);
    }

    /// Offer `files` to the queue, each bound to its own copy of `config`.
    ///
    /// Files failing the extension or size check are rejected first. Valid
    /// files are then admitted in order until the queue is full; the rest are
    /// rejected with [`ValidationError::QueueFull`].
    pub fn add(&self, files: Vec<DocumentFile>, config: &ConfigModel) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        let mut inner = self.write_inner();
        let mut remaining = self.limits.max_jobs.saturating_sub(inner.jobs.len());

        for file in files {
            if let Err(reason) = validate_document(&file, self.limits.max_file_size) {
                tracing::warn!("Rejected {}: {}", file.name, reason);
                outcome.rejected.push(RejectedFile {
                    name: file.name,
                    reason,
                });
                continue;
            }

            if remaining == 0 {
                let reason = ValidationError::QueueFull {
                    name: file.name.clone(),
                    capacity: self.limits.max_jobs,
                };
                tracing::warn!("Rejected {}: {}", file.name, reason);
                outcome.rejected.push(RejectedFile {
                    name: file.name,
                    reason,
                });
                continue;
            }

            let job = Job::new(file, config.clone());
            tracing::debug!("Queued {} as job {}", job.file.name, job.id);
            outcome.accepted.push(job.id);
            inner.jobs.insert(job.id, job);
            remaining -= 1;
        }
        drop(inner);

        tracing::info!(
            "Added {} job(s), rejected {} file(s)",
            outcome.accepted.len(),
            outcome.rejected.len()
        );
        self.emit(QueueChange::JobsAdded {
            ids: outcome.accepted.clone(),
            rejected: outcome.rejected.len(),
        });

        outcome
    }

    /// Remove a pending job.
    pub fn remove(&self, id: JobId) -> Result<Job, QueueError> {
        let mut inner = self.write_inner();
        let status = inner
            .jobs
            .get(&id)
            .map(|job| job.status)
            .ok_or(QueueError::NotFound(id))?;

        if status != JobStatus::Pending {
            return Err(QueueError::InvalidState { job_id: id, status });
        }

        let job = inner
            .jobs
            .shift_remove(&id)
            .ok_or(QueueError::NotFound(id))?;
        drop(inner);

        tracing::info!("Removed job {} ({})", id, job.file.name);
        self.emit(QueueChange::JobRemoved { id });
        Ok(job)
    }

    /// Drop every job and return how many were removed.
    ///
    /// A runner processing this queue observes the clear and returns to idle
    /// before its next tick.
    pub fn clear(&self) -> usize {
        let mut inner = self.write_inner();
        let removed = inner.jobs.len();
        inner.jobs.clear();
        inner.generation += 1;
        drop(inner);

        tracing::info!("Cleared queue ({} job(s) removed)", removed);
        self.emit(QueueChange::Cleared);
        removed
    }

    /// Apply a runner update to one job.
    pub(crate) fn update_status(&self, id: JobId, patch: JobPatch) -> Result<(), QueueError> {
        let mut inner = self.write_inner();
        let job = inner.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        job.apply(patch);
        let (status, progress) = (job.status, job.progress);

        debug_assert!(
            inner
                .jobs
                .values()
                .filter(|j| j.status == JobStatus::Processing)
                .count()
                <= 1,
            "more than one job is processing"
        );
        drop(inner);

        self.emit(QueueChange::JobUpdated {
            id,
            status,
            progress,
        });
        Ok(())
    }

    /// Move the earliest pending job to `Processing` and return a copy of it.
    pub(crate) fn claim_next_pending(&self) -> Option<Job> {
        let mut inner = self.write_inner();

        debug_assert!(
            !inner
                .jobs
                .values()
                .any(|j| j.status == JobStatus::Processing),
            "claimed a job while another is processing"
        );

        let job = inner
            .jobs
            .values_mut()
            .find(|j| j.status == JobStatus::Pending)?;
        job.apply(JobPatch {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            ..Default::default()
        });
        let claimed = job.clone();
        drop(inner);

        self.emit(QueueChange::JobUpdated {
            id: claimed.id,
            status: claimed.status,
            progress: claimed.progress,
        });
        Some(claimed)
    }

    /// Execute a function with read access to the jobs, in queue order
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&IndexMap<JobId, Job>) -> R,
    {
        let inner = self.read_inner();
        f(&inner.jobs)
    }

    /// Clone of every job, in queue order
    pub fn snapshot(&self) -> Vec<Job> {
        self.read(|jobs| jobs.values().cloned().collect())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read(|jobs| jobs.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.read(|jobs| jobs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.limits.max_jobs.saturating_sub(self.len())
    }

    pub fn pending_count(&self) -> usize {
        self.read(|jobs| {
            jobs.values()
                .filter(|j| j.status == JobStatus::Pending)
                .count()
        })
    }

    pub fn counts(&self) -> QueueCounts {
        self.read(|jobs| {
            let mut counts = QueueCounts::default();
            for job in jobs.values() {
                match job.status {
                    JobStatus::Pending => counts.pending += 1,
                    JobStatus::Processing => counts.processing += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
            }
            counts
        })
    }

    /// Number of `clear()` calls so far
    pub fn generation(&self) -> u64 {
        self.read_inner().generation
    }

    /// Subscribe to queue change events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueChange> {
        self.change_tx.subscribe()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
