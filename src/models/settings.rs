use crate::queue::QueueLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings from `settings.yaml` and `DOCFMT_*` environment variables.
///
/// Every field has a default, so a partial (or missing) file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Root URL of the format service
    pub api_base_url: String,

    pub request_timeout_secs: u64,

    /// Maximum number of jobs held by the queue at once
    pub max_queue_size: usize,

    pub max_file_size_mb: u64,

    pub recent_files_limit: usize,

    pub log_dir: String,

    pub debug_mode: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 120,
            max_queue_size: 10,
            max_file_size_mb: 50,
            recent_files_limit: 10,
            log_dir: "logs".to_string(),
            debug_mode: false,
        }
    }
}

impl AppSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn queue_limits(&self) -> QueueLimits {
        QueueLimits {
            max_jobs: self.max_queue_size,
            max_file_size: self.max_file_size_bytes(),
        }
    }
}
