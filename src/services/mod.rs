//! Services module - boundary to the remote format service and local checks.
//!
//! # Components
//!
//! - [`FormatService`]: the upload / format / preview / download / delete contract
//!   consumed by the batch runner. [`HttpFormatService`] is the `reqwest`
//!   implementation; tests substitute fakes or the generated mock.
//! - [`validate_document`]: `.docx` and size checks performed before a file is
//!   queued, so invalid files never reach the network.
//!
//! The services layer has no knowledge of the queue or the runner. All inputs
//! are explicit parameters.
//!
//! # Usage Example
//!
//! ```ignore
//! use docfmt::services::{FormatService, HttpFormatService};
//!
//! let service = HttpFormatService::new("http://localhost:8000", Duration::from_secs(120))?;
//! let uploaded = service.upload(&file).await?;
//! let formatted = service.format(&uploaded.file_id, &options).await?;
//! let bytes = service.download(&formatted.file_id).await?;
//! ```

pub mod format;
pub mod validation;

#[cfg(test)]
pub use format::MockFormatService;
pub use format::{
    FormatRequest, FormatResponse, FormatService, HttpFormatService, PreviewResponse,
    TransportError, UploadResponse,
};
pub use validation::{
    ACCEPTED_EXTENSION, DEFAULT_MAX_FILE_SIZE, ValidationError, format_file_size,
    validate_document,
};
