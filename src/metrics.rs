// Batch metrics module
//
// Lightweight counters for the batch runner, logged when a batch ends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Batch processing metrics
///
/// Uses atomic operations so the runner and any observer can share one
/// instance without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Jobs that finished with a formatted result
    pub jobs_completed: AtomicUsize,

    pub jobs_failed: AtomicUsize,

    /// Jobs whose failure was the service being unreachable
    pub service_unavailable: AtomicUsize,

    /// Total time spent in upload + format, in milliseconds
    pub total_format_time_ms: AtomicU64,

    /// Number of `tick()` calls that did work
    pub ticks: AtomicU64,

    /// Number of runner state transitions
    pub state_transitions: AtomicU64,

    /// Number of status writes that raced with a queue clear
    pub stale_updates: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            jobs_completed: AtomicUsize::new(0),
            jobs_failed: AtomicUsize::new(0),
            service_unavailable: AtomicUsize::new(0),
            total_format_time_ms: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
            stale_updates: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_job_completed(&self, duration: Duration) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.record_format_time(duration);
    }

    pub fn record_job_failed(&self, duration: Duration, unavailable: bool) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        if unavailable {
            self.service_unavailable.fetch_add(1, Ordering::Relaxed);
        }
        self.record_format_time(duration);
    }

    fn record_format_time(&self, duration: Duration) {
        self.total_format_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_transition(&self) {
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_update(&self) {
        self.stale_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> usize {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per processed job in milliseconds
    pub fn avg_format_time_ms(&self) -> f64 {
        let total = self.total_format_time_ms.load(Ordering::Relaxed);
        let count = self.completed() + self.failed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Batch Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Jobs: {} completed, {} failed ({} service unavailable)",
            self.completed(),
            self.failed(),
            self.service_unavailable.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total format time: {:.2}s (avg: {:.2}ms per job)",
            self.total_format_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_format_time_ms()
        );
        tracing::info!(
            "Ticks: {}, state transitions: {}, stale updates: {}",
            self.ticks.load(Ordering::Relaxed),
            self.state_transitions.load(Ordering::Relaxed),
            self.stale_updates.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
