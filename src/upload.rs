//! Builds and drives the multipart upload submission, with byte-level
//! progress and cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::selection::{FileDescriptor, FileHandle, Selection};

const STREAM_CHUNK_SIZE: usize = 65536;

#[derive(Debug, Error)]
pub enum UploadError {
    /// User-input errors, caught before any network call
    #[error("no files selected")]
    NothingSelected,
    #[error("recipient email is required")]
    MissingRecipient,
    #[error("sender email is required")]
    MissingSender,
    /// The server answered with a non-2xx status
    #[error("server rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never completed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal states of one submission. `Cancelled` is not an error: the
/// selection is left intact and no message is surfaced.
#[derive(Debug)]
pub enum UploadOutcome {
    Completed { message: String },
    /// The transfer was stored but something downstream (the notification
    /// email) failed. Surfaced distinctly from plain success.
    CompletedWithWarning { message: String, warning: String },
    Cancelled,
}

/// Byte-level progress of the in-flight submission.
///
/// The reported percentage is monotonically non-decreasing while a submission
/// runs, and resets to 0 on every terminal state.
#[derive(Clone, Default)]
pub struct ProgressHandle {
    sent: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    peak: Arc<AtomicU64>,
}

impl ProgressHandle {
    fn begin(&self, total: u64) {
        self.sent.store(0, Ordering::Relaxed);
        self.peak.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.sent.store(0, Ordering::Relaxed);
        self.peak.store(0, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn bytes_total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Integer percentage, `round(sent / total * 100)`, clamped to 100.
    pub fn percent(&self) -> u8 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        let sent = self.sent.load(Ordering::Relaxed);
        let pct = ((sent as f64 / total as f64) * 100.0).round() as u64;
        let pct = pct.min(100);
        self.peak.fetch_max(pct, Ordering::Relaxed);
        self.peak.load(Ordering::Relaxed) as u8
    }
}

/// One outgoing submission: the selection at the time of submit plus the email
/// metadata. A snapshot; mutating the selection afterwards does not affect an
/// in-flight request.
#[derive(Debug)]
pub struct TransferRequest {
    recipient_email: String,
    sender_email: String,
    files: Vec<FileDescriptor>,
}

impl TransferRequest {
    pub fn new(selection: &Selection, recipient_email: &str, sender_email: &str) -> Self {
        Self {
            recipient_email: recipient_email.to_string(),
            sender_email: sender_email.to_string(),
            files: selection.files().to_vec(),
        }
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    message: String,
    warning: Option<String>,
    #[allow(dead_code)]
    transfer_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Issues upload submissions against a configured backend
pub struct Uploader {
    endpoint: String,
    client: reqwest::Client,
    progress: ProgressHandle,
}

impl Uploader {
    pub fn new(backend_url: &str) -> Self {
        Self {
            endpoint: format!("{}/upload", backend_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
            progress: ProgressHandle::default(),
        }
    }

    /// Handle for observing the progress of submissions from this uploader
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Submit the selection as one multipart POST.
    ///
    /// Preconditions (non-empty selection, both emails) are checked before
    /// anything touches the network. On success the selection is cleared; on
    /// failure or cancellation it is preserved so the user can resubmit
    /// without re-selecting. Progress resets to 0 in every terminal state.
    pub async fn send(
        &self,
        selection: &mut Selection,
        recipient_email: &str,
        sender_email: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        if selection.is_empty() {
            return Err(UploadError::NothingSelected);
        }
        if recipient_email.trim().is_empty() {
            return Err(UploadError::MissingRecipient);
        }
        if sender_email.trim().is_empty() {
            return Err(UploadError::MissingSender);
        }

        let request = TransferRequest::new(selection, recipient_email, sender_email);
        self.progress.begin(request.total_size());

        if cancel.is_cancelled() {
            self.progress.reset();
            return Ok(UploadOutcome::Cancelled);
        }

        let form = self.build_form(&request).await?;
        let send_future = self.client.post(&self.endpoint).multipart(form).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                // Best-effort: dropping the request future aborts the
                // transport, but the server may still finish processing.
                self.progress.reset();
                return Ok(UploadOutcome::Cancelled);
            }
            result = send_future => match result {
                Ok(response) => response,
                Err(e) => {
                    self.progress.reset();
                    return Err(UploadError::Network(e));
                }
            },
        };

        let status = response.status();
        if status.is_success() {
            let body: UploadResponse = response
                .json()
                .await
                .unwrap_or_else(|_| UploadResponse::default());
            self.progress.reset();
            selection.clear();
            // A 2xx with no usable body still deserves a readable message
            let message = if body.message.is_empty() {
                "Upload successful".to_string()
            } else {
                body.message
            };
            match body.warning {
                Some(warning) => Ok(UploadOutcome::CompletedWithWarning { message, warning }),
                None => Ok(UploadOutcome::Completed { message }),
            }
        } else {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "upload failed".to_string());
            self.progress.reset();
            Err(UploadError::Rejected { status: status.as_u16(), message })
        }
    }

    /// One `files[]` part per payload, one `paths[]` part per payload in the
    /// same order, then the singular email fields.
    async fn build_form(&self, request: &TransferRequest) -> Result<Form, UploadError> {
        let mut form = Form::new();
        for file in request.files() {
            let part = self.file_part(file).await?;
            form = form.part("files[]", part);
        }
        for file in request.files() {
            form = form.text("paths[]", file.path.clone());
        }
        form = form.text("email", request.recipient_email.clone());
        form = form.text("sender_email", request.sender_email.clone());
        Ok(form)
    }

    /// Wrap the file payload in a byte-counting stream so the transport
    /// drives the progress counter as it reads.
    async fn file_part(&self, file: &FileDescriptor) -> Result<Part, UploadError> {
        let counter = self.progress.sent.clone();
        let body = match &file.handle {
            FileHandle::Disk(path) => {
                let opened = tokio::fs::File::open(path).await.map_err(|e| UploadError::Io {
                    path: file.path.clone(),
                    source: e,
                })?;
                let stream = ReaderStream::new(opened).inspect_ok(move |chunk| {
                    counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                });
                reqwest::Body::wrap_stream(stream)
            }
            FileHandle::Memory(bytes) => {
                let chunks: Vec<Vec<u8>> = bytes
                    .chunks(STREAM_CHUNK_SIZE)
                    .map(|chunk| chunk.to_vec())
                    .collect();
                let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>))
                    .inspect_ok(move |chunk| {
                        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    });
                reqwest::Body::wrap_stream(stream)
            }
        };

        let part = Part::stream_with_length(body, file.size)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")?;
        Ok(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_descriptor(path: &str, size: usize) -> FileDescriptor {
        FileDescriptor {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            size: size as u64,
            handle: FileHandle::Memory(vec![0; size]),
        }
    }

    #[tokio::test]
    async fn test_empty_selection_never_issues_a_request() {
        // The endpoint is unroutable; a validation error proves nothing was sent.
        let uploader = Uploader::new("http://127.0.0.1:1");
        let mut selection = Selection::new();
        let cancel = CancellationToken::new();

        let result = uploader.send(&mut selection, "to@example.com", "from@example.com", &cancel).await;
        assert!(matches!(result, Err(UploadError::NothingSelected)));
    }

    #[tokio::test]
    async fn test_missing_emails_are_caught_before_dispatch() {
        let uploader = Uploader::new("http://127.0.0.1:1");
        let mut selection = Selection::new();
        selection.append(vec![memory_descriptor("/a.txt", 4)]);
        let cancel = CancellationToken::new();

        let result = uploader.send(&mut selection, "", "from@example.com", &cancel).await;
        assert!(matches!(result, Err(UploadError::MissingRecipient)));

        let result = uploader.send(&mut selection, "to@example.com", "  ", &cancel).await;
        assert!(matches!(result, Err(UploadError::MissingSender)));

        // Selection untouched in both cases
        assert_eq!(selection.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_dispatch_preserves_selection() {
        let uploader = Uploader::new("http://127.0.0.1:1");
        let mut selection = Selection::new();
        selection.append(vec![memory_descriptor("/a.txt", 4)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = uploader
            .send(&mut selection, "to@example.com", "from@example.com", &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Cancelled));
        assert_eq!(selection.len(), 1);
        assert_eq!(uploader.progress().percent(), 0);
    }

    #[test]
    fn test_request_is_a_snapshot() {
        let mut selection = Selection::new();
        selection.append(vec![memory_descriptor("/a.txt", 4), memory_descriptor("/b.txt", 6)]);

        let request = TransferRequest::new(&selection, "to@example.com", "from@example.com");
        selection.clear();

        assert_eq!(request.files().len(), 2);
        assert_eq!(request.total_size(), 10);
    }

    #[test]
    fn test_progress_percent_rounds_and_clamps() {
        let progress = ProgressHandle::default();
        progress.begin(200);
        assert_eq!(progress.percent(), 0);

        progress.sent.store(81, Ordering::Relaxed);
        assert_eq!(progress.percent(), 41); // 40.5 rounds up

        progress.sent.store(500, Ordering::Relaxed);
        assert_eq!(progress.percent(), 100);

        progress.reset();
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_progress_with_unknown_total_stays_at_zero() {
        let progress = ProgressHandle::default();
        progress.begin(0);
        progress.sent.store(1000, Ordering::Relaxed);
        assert_eq!(progress.percent(), 0);
    }
}
