use crate::models::options::ConfigModel;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
///
/// `Pending` → `Processing` → `Completed` | `Failed`. Only the batch runner
/// moves a job out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where the bytes of a document come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentContent {
    /// A file on the local disk, read at upload time
    Path(Utf8PathBuf),

    /// Bytes already held in memory
    Bytes(Arc<[u8]>),

    /// A document that already lives on the format service
    Uploaded { file_id: String },
}

/// A document handed to the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFile {
    pub name: String,
    pub size: u64,
    pub content: DocumentContent,
}

impl DocumentFile {
    /// Describe a local file. The size is taken from the file system.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let name = path.file_name().unwrap_or(path.as_str()).to_string();
        Ok(Self {
            name,
            size,
            content: DocumentContent::Path(path),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            content: DocumentContent::Bytes(bytes),
        }
    }

    /// Refer to a document previously uploaded to the format service.
    pub fn uploaded(name: impl Into<String>, size: u64, file_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            content: DocumentContent::Uploaded {
                file_id: file_id.into(),
            },
        }
    }

    /// Lower-cased extension including the dot, e.g. `.docx`.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

/// One queued document with its bound configuration and lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub file: DocumentFile,
    pub status: JobStatus,

    /// 0..=100, frozen at its last value when the job fails
    pub progress: u8,
    pub error: Option<String>,

    /// Remote id of the formatted result, set on completion
    pub result_handle: Option<String>,

    /// Remote id of the uploaded source document
    pub remote_file_id: Option<String>,

    /// Copy of the configuration taken when the job was queued
    pub config_snapshot: ConfigModel,

    pub added_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(file: DocumentFile, config_snapshot: ConfigModel) -> Self {
        let remote_file_id = match &file.content {
            DocumentContent::Uploaded { file_id } => Some(file_id.clone()),
            _ => None,
        };

        Self {
            id: JobId::new(),
            file,
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            result_handle: None,
            remote_file_id,
            config_snapshot,
            added_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Apply a status patch written by the batch runner.
    pub(crate) fn apply(&mut self, patch: JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
            if status.is_terminal() {
                self.finished_at = Some(Utc::now());
            }
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.min(100);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(handle) = patch.result_handle {
            self.result_handle = Some(handle);
        }
        if let Some(file_id) = patch.remote_file_id {
            self.remote_file_id = Some(file_id);
        }
    }

    /// Output name used when saving the formatted document.
    pub fn formatted_file_name(&self) -> String {
        format!("{}_formatted.docx", self.file.stem())
    }
}

/// Partial update of a job. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub result_handle: Option<String>,
    pub remote_file_id: Option<String>,
}

impl JobPatch {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn uploaded(file_id: impl Into<String>, progress: u8) -> Self {
        Self {
            progress: Some(progress),
            remote_file_id: Some(file_id.into()),
            ..Default::default()
        }
    }

    pub fn completed(result_handle: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result_handle: Some(result_handle.into()),
            ..Default::default()
        }
    }

    /// Failure keeps the last reported progress.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
