use crate::models::{ConfigModel, DocumentContent, DocumentFile};
use crate::services::validation::DOCX_MIME_TYPE;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Response of `POST /api/upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    pub message: String,
}

/// Body of `POST /api/format`
#[derive(Debug, Serialize)]
pub struct FormatRequest<'a> {
    pub file_id: &'a str,
    pub options: &'a ConfigModel,
}

/// Response of `POST /api/format`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatResponse {
    pub file_id: String,
    pub original_filename: String,
    pub formatted_filename: String,
    pub message: String,
}

/// Response of `GET /api/preview/{file_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub file_id: String,
    pub content: String,
    pub page_count: u32,
}

/// Errors talking to the format service
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Format service unavailable: {0}")]
    Unavailable(String),

    #[error("Request to format service failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Format service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

/// The remote document formatting engine.
///
/// Every call is a suspension point; the batch runner awaits each one before
/// moving on, so at most one request is in flight per runner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormatService: Send + Sync {
    /// Upload a document and return its remote id
    async fn upload(&self, file: &DocumentFile) -> Result<UploadResponse, TransportError>;

    /// Apply `options` to an uploaded document
    async fn format(
        &self,
        file_id: &str,
        options: &ConfigModel,
    ) -> Result<FormatResponse, TransportError>;

    async fn preview(&self, file_id: &str) -> Result<PreviewResponse, TransportError>;

    /// Fetch the bytes of a (formatted) document
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;

    async fn delete(&self, file_id: &str) -> Result<(), TransportError>;

    /// Direct download link for a remote document
    fn download_url(&self, file_id: &str) -> String;
}

/// [`FormatService`] over HTTP.
pub struct HttpFormatService {
    client: Client,
    base_url: String,
}

impl HttpFormatService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into [`TransportError::Status`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }
}

/// Pull the `detail` message out of an error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl FormatService for HttpFormatService {
    async fn upload(&self, file: &DocumentFile) -> Result<UploadResponse, TransportError> {
        let bytes = match &file.content {
            DocumentContent::Path(path) => tokio::fs::read(path).await?,
            DocumentContent::Bytes(bytes) => bytes.to_vec(),
            DocumentContent::Uploaded { file_id } => {
                tracing::debug!("{} already uploaded as {}", file.name, file_id);
                return Ok(UploadResponse {
                    file_id: file_id.clone(),
                    filename: file.name.clone(),
                    size: file.size,
                    message: "File already uploaded".to_string(),
                });
            }
        };

        tracing::debug!("Uploading {} ({} bytes)", file.name, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(DOCX_MIME_TYPE)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("/api/upload"))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = Self::check(response).await?.json().await?;
        tracing::info!("Uploaded {} as {}", uploaded.filename, uploaded.file_id);
        Ok(uploaded)
    }

    async fn format(
        &self,
        file_id: &str,
        options: &ConfigModel,
    ) -> Result<FormatResponse, TransportError> {
        tracing::debug!(
            "Formatting {} with {} option(s)",
            file_id,
            options.option_count()
        );

        let response = self
            .client
            .post(self.endpoint("/api/format"))
            .json(&FormatRequest { file_id, options })
            .send()
            .await?;

        let formatted: FormatResponse = Self::check(response).await?.json().await?;
        tracing::info!("Formatted {} -> {}", file_id, formatted.file_id);
        Ok(formatted)
    }

    async fn preview(&self, file_id: &str) -> Result<PreviewResponse, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/api/preview/{}", file_id)))
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(self.download_url(file_id)).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        tracing::debug!("Downloaded {} ({} bytes)", file_id, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn delete(&self, file_id: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("/api/document/{}", file_id)))
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!("Deleted remote document {}", file_id);
        Ok(())
    }

    fn download_url(&self, file_id: &str) -> String {
        self.endpoint(&format!("/api/download/{}", file_id))
    }
}
