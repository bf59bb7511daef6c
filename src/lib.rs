// docfmt - batch formatting client for Word documents
//
// This is the library crate containing the queue, the batch runner and the
// format service client. The binary crate (main.rs) provides the CLI.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod presets;
pub mod queue;
pub mod results;
pub mod runner;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{AppSettings, ConfigModel, DocumentFile, Job, JobId, JobStatus, SectionKind};
pub use presets::{Preset, PresetCatalog};
pub use queue::{AddOutcome, JobQueue, QueueChange, QueueError, QueueLimits};
pub use results::{BatchSummary, DownloadToken, ResultAggregator, SaveFailure, SaveReport};
pub use runner::{BatchRunner, RunReport, RunnerEvent, RunnerState, TickOutcome};
pub use services::{FormatService, HttpFormatService, TransportError, ValidationError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
