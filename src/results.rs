// Result aggregation
//
// Completed results are derived from the queue on every call; nothing here
// holds state of its own.

use crate::models::{Job, JobId, JobStatus};
use crate::queue::JobQueue;
use crate::services::FormatService;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Everything needed to fetch one formatted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadToken {
    pub job_id: JobId,

    /// Remote id of the formatted result
    pub file_id: String,

    /// Suggested local name (`<stem>_formatted.docx`)
    pub file_name: String,
    pub url: String,
}

/// A result that could not be fetched or written by
/// [`ResultAggregator::save_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub job_id: JobId,
    pub file_name: String,
    pub error: String,
}

/// Outcome of a bulk save. One failed download never stops the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Written paths, in queue order
    pub saved: Vec<Utf8PathBuf>,
    pub failed: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Completed / failed / total counters for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,

    /// True when at least one job has a result to download
    pub can_download_all: bool,
}

/// Read-only view of the finished jobs in a [`JobQueue`].
#[derive(Clone)]
pub struct ResultAggregator {
    queue: JobQueue,
}

impl ResultAggregator {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Ids of completed jobs, in queue order
    pub fn completed_ids(&self) -> IndexSet<JobId> {
        self.queue.read(|jobs| {
            jobs.values()
                .filter(|job| job.status == JobStatus::Completed)
                .map(|job| job.id)
                .collect()
        })
    }

    pub fn completed_jobs(&self) -> Vec<Job> {
        self.queue.read(|jobs| {
            jobs.values()
                .filter(|job| job.status == JobStatus::Completed && job.result_handle.is_some())
                .cloned()
                .collect()
        })
    }

    pub fn summary(&self) -> BatchSummary {
        let counts = self.queue.counts();
        BatchSummary {
            completed: counts.completed,
            failed: counts.failed,
            total: counts.total(),
            can_download_all: counts.completed > 0,
        }
    }

    /// Download tokens for every completed job. Empty (not an error) when
    /// nothing has completed yet.
    ///
    /// File names are unique within the batch: a second `report.docx`
    /// becomes `report_formatted (2).docx`.
    pub fn download_all(&self, service: &dyn FormatService) -> Vec<DownloadToken> {
        let mut used = HashSet::new();
        let tokens: Vec<DownloadToken> = self
            .completed_jobs()
            .into_iter()
            .filter_map(|job| {
                let file_id = job.result_handle.clone()?;
                Some(DownloadToken {
                    job_id: job.id,
                    url: service.download_url(&file_id),
                    file_name: unique_name(&mut used, job.formatted_file_name()),
                    file_id,
                })
            })
            .collect();

        if tokens.is_empty() {
            tracing::debug!("Bulk download requested with no completed jobs");
        } else {
            tracing::info!("Prepared {} download(s)", tokens.len());
        }
        tokens
    }

    /// Fetch every completed result and write it into `dir`.
    ///
    /// Only a failure to create `dir` is an error. A download or write that
    /// fails for one job is recorded in the report and the rest are still
    /// saved.
    pub async fn save_all(&self, service: &dyn FormatService, dir: &Utf8Path) -> Result<SaveReport> {
        let tokens = self.download_all(service);
        let mut report = SaveReport::default();
        if tokens.is_empty() {
            return Ok(report);
        }

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", dir))?;

        for token in tokens {
            match save_one(service, dir, &token).await {
                Ok(path) => report.saved.push(path),
                Err(err) => {
                    tracing::error!("Could not save {}: {:#}", token.file_name, err);
                    report.failed.push(SaveFailure {
                        job_id: token.job_id,
                        file_name: token.file_name,
                        error: format!("{:#}", err),
                    });
                }
            }
        }

        Ok(report)
    }
}

async fn save_one(
    service: &dyn FormatService,
    dir: &Utf8Path,
    token: &DownloadToken,
) -> Result<Utf8PathBuf> {
    let bytes = service
        .download(&token.file_id)
        .await
        .with_context(|| format!("Failed to download {}", token.file_name))?;

    let path = dir.join(&token.file_name);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path))?;

    tracing::info!("Saved {} ({} bytes)", path, bytes.len());
    Ok(path)
}

fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.to_lowercase()) {
        return name;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name.as_str(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
