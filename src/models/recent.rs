use crate::models::Job;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap of the recent-files list.
pub const DEFAULT_RECENT_FILES_LIMIT: usize = 10;

/// One formatted document remembered across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentFile {
    /// Remote id of the formatted result
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub size: u64,
}

impl RecentFile {
    /// Entry for a completed job. Returns `None` for jobs without a result.
    pub fn from_completed_job(job: &Job) -> Option<Self> {
        let id = job.result_handle.clone()?;
        Some(Self {
            id,
            name: job.file.name.clone(),
            date: job.finished_at.unwrap_or_else(Utc::now),
            size: job.file.size,
        })
    }
}

/// Newest-first list of recently formatted documents, capped at `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentFiles {
    limit: usize,
    entries: Vec<RecentFile>,
}

impl RecentFiles {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::new(),
        }
    }

    /// Rebuild from persisted entries, enforcing the cap.
    pub fn from_entries(limit: usize, entries: Vec<RecentFile>) -> Self {
        let mut recent = Self::new(limit);
        // Oldest first so the newest ends up at the front
        for entry in entries.into_iter().rev() {
            recent.record(entry);
        }
        recent
    }

    /// Put `entry` at the front, replacing any entry with the same id.
    pub fn record(&mut self, entry: RecentFile) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
    }

    pub fn entries(&self) -> &[RecentFile] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RecentFile> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_FILES_LIMIT)
    }
}
