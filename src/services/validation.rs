//! Local checks applied before a document is accepted into the queue.
//!
//! These never touch the network: a file that fails here is rejected on the
//! spot and the format service never sees it.

use crate::models::DocumentFile;
use thiserror::Error;

/// The only document type the format service accepts.
pub const ACCEPTED_EXTENSION: &str = ".docx";

/// MIME type sent with uploads.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Default upload limit (50 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Reasons a document is rejected locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type for {name}. Please upload a .docx file.")]
    UnsupportedExtension { name: String },

    #[error("File too large: {name} is {size} bytes. Maximum size is {max_mb}MB.")]
    FileTooLarge { name: String, size: u64, max_mb: u64 },

    #[error("Queue is full ({capacity} files maximum); {name} was not added")]
    QueueFull { name: String, capacity: usize },
}

/// Check extension and size of a document.
pub fn validate_document(file: &DocumentFile, max_file_size: u64) -> Result<(), ValidationError> {
    if file.extension().as_deref() != Some(ACCEPTED_EXTENSION) {
        return Err(ValidationError::UnsupportedExtension {
            name: file.name.clone(),
        });
    }

    if file.size > max_file_size {
        return Err(ValidationError::FileTooLarge {
            name: file.name.clone(),
            size: file.size,
            max_mb: max_file_size / (1024 * 1024),
        });
    }

    Ok(())
}

/// Human-readable byte size ("512 B", "1.5 KB", "2.0 MB").
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_docx_within_limit() {
        let file = DocumentFile::uploaded("Letter.DocX", 1024, "id");
        assert_eq!(validate_document(&file, DEFAULT_MAX_FILE_SIZE), Ok(()));
    }

    #[test]
    fn test_rejects_other_extensions() {
        for name in ["notes.doc", "paper.pdf", "docx", "archive.docx.zip"] {
            let file = DocumentFile::uploaded(name, 10, "id");
            assert!(
                matches!(
                    validate_document(&file, DEFAULT_MAX_FILE_SIZE),
                    Err(ValidationError::UnsupportedExtension { .. })
                ),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_rejects_oversized_files() {
        let file = DocumentFile::uploaded("big.docx", DEFAULT_MAX_FILE_SIZE + 1, "id");
        let err = validate_document(&file, DEFAULT_MAX_FILE_SIZE).unwrap_err();

        assert_eq!(
            err,
            ValidationError::FileTooLarge {
                name: "big.docx".to_string(),
                size: DEFAULT_MAX_FILE_SIZE + 1,
                max_mb: 50,
            }
        );
        assert!(err.to_string().contains("Maximum size is 50MB"));
    }

    #[test]
    fn test_size_exactly_at_limit_is_allowed() {
        let file = DocumentFile::uploaded("edge.docx", DEFAULT_MAX_FILE_SIZE, "id");
        assert!(validate_document(&file, DEFAULT_MAX_FILE_SIZE).is_ok());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2.0 MB");
    }
}
