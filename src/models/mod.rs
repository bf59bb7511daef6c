//! Data models for docfmt.
//!
//! - [`ConfigModel`]: the five-section formatting options sent with each format request
//! - [`Job`]: one queued document, its configuration snapshot and lifecycle status
//! - [`AppSettings`]: service URL, queue limits and logging settings from `settings.yaml`
//! - [`RecentFiles`]: the capped list of recently formatted documents
//!
//! Jobs are never mutated directly by callers. The [`JobQueue`](crate::queue::JobQueue)
//! owns them and the [`BatchRunner`](crate::runner::BatchRunner) is the only writer of
//! their status.

pub mod job;
pub mod options;
pub mod recent;
pub mod settings;

pub use job::{DocumentContent, DocumentFile, Job, JobId, JobPatch, JobStatus};
pub use options::{AssignmentError, ConfigModel, OptionValue, Section, SectionKind, section};
pub use recent::{DEFAULT_RECENT_FILES_LIMIT, RecentFile, RecentFiles};
pub use settings::AppSettings;
