//! Shared helpers for integration tests: a scripted in-memory format service.

#![allow(dead_code)]

use async_trait::async_trait;
use docfmt::models::{ConfigModel, DocumentFile};
use docfmt::services::{
    FormatResponse, FormatService, PreviewResponse, TransportError, UploadResponse,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Holds a format call for one file until the test releases it.
#[derive(Default)]
pub struct Gate {
    /// Notified when the format call for the file has started
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory [`FormatService`].
///
/// Upload returns `up-<name>`, format returns `fmt-up-<name>`. Calls are
/// recorded as `"upload:<name>"` / `"format:<name>"`.
#[derive(Default)]
pub struct FakeFormatService {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    failing_downloads: Mutex<HashSet<String>>,
    unreachable: Mutex<bool>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    formats: Mutex<Vec<(String, ConfigModel)>>,
}

impl FakeFormatService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the format call for `name` fail with a 500.
    pub fn fail_format(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Make the download of result `file_id` fail with a 404.
    pub fn fail_download(&self, file_id: &str) {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(file_id.to_string());
    }

    /// Make every call fail as if the service were down.
    pub fn go_offline(&self) {
        *self.unreachable.lock().unwrap() = true;
    }

    /// Block the format call for `name` until the returned gate is released.
    pub fn gate(&self, name: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(name.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the files that reached the format call, in order
    pub fn formatted_names(&self) -> Vec<String> {
        self.formats
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn options_for(&self, name: &str) -> Option<ConfigModel> {
        self.formats
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, options)| options.clone())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, call: String) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if *self.unreachable.lock().unwrap() {
            self.leave();
            return Err(TransportError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn name_of(file_id: &str) -> &str {
    file_id.strip_prefix("up-").unwrap_or(file_id)
}

#[async_trait]
impl FormatService for FakeFormatService {
    async fn upload(&self, file: &DocumentFile) -> Result<UploadResponse, TransportError> {
        self.enter(format!("upload:{}", file.name))?;
        tokio::task::yield_now().await;
        self.leave();

        Ok(UploadResponse {
            file_id: format!("up-{}", file.name),
            filename: file.name.clone(),
            size: file.size,
            message: "File uploaded successfully".to_string(),
        })
    }

    async fn format(
        &self,
        file_id: &str,
        options: &ConfigModel,
    ) -> Result<FormatResponse, TransportError> {
        let name = name_of(file_id).to_string();
        self.enter(format!("format:{}", name))?;
        self.formats
            .lock()
            .unwrap()
            .push((name.clone(), options.clone()));

        let gate = self.gates.lock().unwrap().get(&name).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        tokio::task::yield_now().await;
        self.leave();

        if self.failing.lock().unwrap().contains(&name) {
            return Err(TransportError::Status {
                status: 500,
                detail: format!("Error formatting document: {} is corrupt", name),
            });
        }

        Ok(FormatResponse {
            file_id: format!("fmt-{}", file_id),
            original_filename: name.clone(),
            formatted_filename: format!("{}_formatted.docx", name.trim_end_matches(".docx")),
            message: "Document formatted successfully".to_string(),
        })
    }

    async fn preview(&self, file_id: &str) -> Result<PreviewResponse, TransportError> {
        Ok(PreviewResponse {
            file_id: file_id.to_string(),
            content: format!("preview of {}", file_id),
            page_count: 1,
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("download:{}", file_id));
        if self.failing_downloads.lock().unwrap().contains(file_id) {
            return Err(TransportError::Status {
                status: 404,
                detail: "Formatted document not found".to_string(),
            });
        }
        Ok(format!("formatted:{}", file_id).into_bytes())
    }

    async fn delete(&self, _file_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn download_url(&self, file_id: &str) -> String {
        format!("http://fake/api/download/{}", file_id)
    }
}

pub fn docx(name: &str) -> DocumentFile {
    DocumentFile::from_bytes(name, vec![0u8; 64])
}

pub fn docs(names: &[&str]) -> Vec<DocumentFile> {
    names.iter().map(|name| docx(name)).collect()
}
