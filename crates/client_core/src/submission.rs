//! Drives one workflow file through validation and a single upload.
//!
//! ```text
//! Idle -> Selected -> Rejected
//!                  -> Accepted -> Submitting -> Succeeded -> (2000 ms) -> Idle
//!                                            -> Failed
//! ```
//!
//! `Submitting` is the only in-flight marker: [`SubmissionController::submit`]
//! returns [`SubmitOutcome::Ignored`] instead of issuing a second upload while
//! it is set. `Rejected` and `Failed` stay until the next selection or retry.

use std::{
    path::Path,
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use shared::protocol::UploadResponse;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::RequestError,
    timer::{schedule_after, ScheduledTask},
    validation::{
        read_failure, validate_content, validate_name, validate_size, validate_workflow_file,
        ValidationError, ValidationOutcome,
    },
};

pub const AUTO_RESET_DELAY: Duration = Duration::from_millis(2000);
pub const UPLOADING_MESSAGE: &str = "Uploading workflow...";
pub const UPLOADED_MESSAGE: &str = "Workflow uploaded successfully";

#[async_trait]
pub trait WorkflowUploader: Send + Sync {
    async fn upload_workflow(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RequestError>;
}

/// Hooks invoked after the corresponding transition has been applied.
pub trait SubmissionObserver: Send + Sync {
    fn file_selected(&self, _candidate: &UploadCandidate) {}
    fn upload_succeeded(&self, _response: &UploadResponse) {}
    fn upload_failed(&self, _error: &RequestError) {}
}

pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub raw_bytes: Vec<u8>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSummary {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    Selected,
    Rejected(ValidationError),
    Accepted,
    Submitting,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSnapshot {
    pub phase: SubmissionPhase,
    pub candidate: Option<CandidateSummary>,
    pub last_error: Option<String>,
    pub progress_message: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Accepted(CandidateSummary),
    Rejected(ValidationError),
    /// A submission is in flight, a newer selection superseded this one, or
    /// the controller was shut down.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocked {
    NoCandidate,
    InFlight,
    Disabled,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Succeeded(UploadResponse),
    Failed(RequestError),
    Ignored(SubmitBlocked),
}

struct SubmissionState {
    phase: SubmissionPhase,
    candidate: Option<UploadCandidate>,
    last_error: Option<String>,
    progress_message: Option<String>,
    disabled: bool,
    closed: bool,
    selection_seq: u64,
    reset_task: Option<ScheduledTask>,
}

impl SubmissionState {
    fn snapshot(&self) -> SubmissionSnapshot {
        SubmissionSnapshot {
            phase: self.phase.clone(),
            candidate: self.candidate.as_ref().map(|candidate| CandidateSummary {
                file_name: candidate.file_name.clone(),
                size_bytes: candidate.size_bytes,
            }),
            last_error: self.last_error.clone(),
            progress_message: self.progress_message.clone(),
            disabled: self.disabled,
        }
    }
}

pub struct SubmissionController {
    uploader: Arc<dyn WorkflowUploader>,
    observer: Arc<dyn SubmissionObserver>,
    reset_delay: Duration,
    inner: Mutex<SubmissionState>,
    events: broadcast::Sender<SubmissionSnapshot>,
}

impl SubmissionController {
    pub fn new(uploader: Arc<dyn WorkflowUploader>) -> Arc<Self> {
        Self::with_observer(uploader, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        uploader: Arc<dyn WorkflowUploader>,
        observer: Arc<dyn SubmissionObserver>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            uploader,
            observer,
            reset_delay: AUTO_RESET_DELAY,
            inner: Mutex::new(SubmissionState {
                phase: SubmissionPhase::Idle,
                candidate: None,
                last_error: None,
                progress_message: None,
                disabled: false,
                closed: false,
                selection_seq: 0,
                reset_task: None,
            }),
            events,
        })
    }

    /// Validates an in-memory file and, if every check passes, makes it the candidate.
    pub async fn select_bytes(&self, file_name: &str, bytes: Vec<u8>) -> SelectOutcome {
        let Some(seq) = self.begin_selection().await else {
            return SelectOutcome::Ignored;
        };
        let result = validate_workflow_file(file_name, &bytes);
        self.finish_selection(seq, file_name, bytes, result).await
    }

    /// Same pipeline as [`Self::select_bytes`], reading the file from disk.
    /// Name and size are checked before the contents are read.
    pub async fn select_path(&self, path: &Path) -> SelectOutcome {
        let Some(seq) = self.begin_selection().await else {
            return SelectOutcome::Ignored;
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Err(err) = validate_name(&file_name) {
            return self.finish_selection(seq, &file_name, Vec::new(), Err(err)).await;
        }
        let size_bytes = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to stat workflow file");
                return self
                    .finish_selection(seq, &file_name, Vec::new(), Err(read_failure()))
                    .await;
            }
        };
        if let Err(err) = validate_size(size_bytes) {
            return self.finish_selection(seq, &file_name, Vec::new(), Err(err)).await;
        }
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read workflow file");
                return self
                    .finish_selection(seq, &file_name, Vec::new(), Err(read_failure()))
                    .await;
            }
        };
        // The file may have grown between stat and read.
        let result = validate_size(bytes.len() as u64).and_then(|()| validate_content(&bytes));
        self.finish_selection(seq, &file_name, bytes, result).await
    }

    /// Uploads the current candidate. At most one upload is in flight; a
    /// trigger while submitting, disabled, or without a candidate is a no-op.
    pub async fn submit(self: &Arc<Self>) -> SubmitOutcome {
        let (file_name, bytes) = {
            let mut guard = self.inner.lock().await;
            if guard.closed {
                return SubmitOutcome::Ignored(SubmitBlocked::Closed);
            }
            if guard.disabled {
                return SubmitOutcome::Ignored(SubmitBlocked::Disabled);
            }
            match guard.phase {
                SubmissionPhase::Submitting => {
                    debug!("upload already in flight");
                    return SubmitOutcome::Ignored(SubmitBlocked::InFlight);
                }
                SubmissionPhase::Accepted | SubmissionPhase::Failed(_) => {}
                _ => return SubmitOutcome::Ignored(SubmitBlocked::NoCandidate),
            }
            let Some(candidate) = guard.candidate.as_ref() else {
                return SubmitOutcome::Ignored(SubmitBlocked::NoCandidate);
            };
            let upload = (candidate.file_name.clone(), candidate.raw_bytes.clone());

            guard.last_error = None;
            guard.progress_message = Some(UPLOADING_MESSAGE.to_string());
            guard.phase = SubmissionPhase::Submitting;
            let snapshot = guard.snapshot();
            drop(guard);
            let _ = self.events.send(snapshot);
            upload
        };

        info!(file_name = %file_name, "submitting workflow");
        match self.uploader.upload_workflow(&file_name, bytes).await {
            Ok(response) => {
                if !self.record_success().await {
                    return SubmitOutcome::Succeeded(response);
                }
                info!(
                    file_name = %response.file_name,
                    commit_sha = %response.commit_sha,
                    "workflow uploaded"
                );
                self.observer.upload_succeeded(&response);
                SubmitOutcome::Succeeded(response)
            }
            Err(err) => {
                if !self.record_failure(&err).await {
                    return SubmitOutcome::Failed(err);
                }
                warn!(
                    file_name = %file_name,
                    status = ?err.status(),
                    error = %err.user_message(),
                    "workflow upload failed"
                );
                self.observer.upload_failed(&err);
                SubmitOutcome::Failed(err)
            }
        }
    }

    pub async fn set_disabled(&self, disabled: bool) {
        let mut guard = self.inner.lock().await;
        if guard.closed || guard.disabled == disabled {
            return;
        }
        guard.disabled = disabled;
        let snapshot = guard.snapshot();
        drop(guard);
        let _ = self.events.send(snapshot);
    }

    pub async fn snapshot(&self) -> SubmissionSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionSnapshot> {
        self.events.subscribe()
    }

    /// Cancels the pending auto-reset. Nothing writes to the controller afterwards.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.closed = true;
        guard.reset_task = None;
    }

    async fn begin_selection(&self) -> Option<u64> {
        let mut guard = self.inner.lock().await;
        if guard.closed || guard.phase == SubmissionPhase::Submitting {
            return None;
        }
        guard.selection_seq += 1;
        guard.reset_task = None;
        guard.candidate = None;
        guard.last_error = None;
        guard.progress_message = None;
        guard.phase = SubmissionPhase::Selected;
        let seq = guard.selection_seq;
        let snapshot = guard.snapshot();
        drop(guard);
        let _ = self.events.send(snapshot);
        Some(seq)
    }

    async fn finish_selection(
        &self,
        seq: u64,
        file_name: &str,
        bytes: Vec<u8>,
        result: ValidationOutcome,
    ) -> SelectOutcome {
        let mut guard = self.inner.lock().await;
        if guard.closed || guard.selection_seq != seq {
            return SelectOutcome::Ignored;
        }

        match result {
            Ok(()) => {
                let candidate = UploadCandidate {
                    file_name: file_name.to_string(),
                    size_bytes: bytes.len() as u64,
                    raw_bytes: bytes,
                };
                let summary = CandidateSummary {
                    file_name: candidate.file_name.clone(),
                    size_bytes: candidate.size_bytes,
                };
                guard.candidate = Some(candidate.clone());
                guard.phase = SubmissionPhase::Accepted;
                let snapshot = guard.snapshot();
                drop(guard);

                debug!(file_name, size_bytes = summary.size_bytes, "workflow file accepted");
                let _ = self.events.send(snapshot);
                self.observer.file_selected(&candidate);
                SelectOutcome::Accepted(summary)
            }
            Err(err) => {
                guard.candidate = None;
                guard.last_error = Some(err.reason().to_string());
                guard.phase = SubmissionPhase::Rejected(err.clone());
                let snapshot = guard.snapshot();
                drop(guard);

                info!(file_name, reason = %err, "workflow file rejected");
                let _ = self.events.send(snapshot);
                SelectOutcome::Rejected(err)
            }
        }
    }

    /// Returns `false` when the controller was shut down mid-upload.
    async fn record_success(self: &Arc<Self>) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return false;
        }
        guard.progress_message = Some(UPLOADED_MESSAGE.to_string());
        guard.phase = SubmissionPhase::Succeeded;

        let controller: Weak<Self> = Arc::downgrade(self);
        guard.reset_task = Some(schedule_after(self.reset_delay, async move {
            if let Some(controller) = controller.upgrade() {
                controller.reset_after_success().await;
            }
        }));
        let snapshot = guard.snapshot();
        drop(guard);
        let _ = self.events.send(snapshot);
        true
    }

    async fn record_failure(&self, err: &RequestError) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return false;
        }
        let message = err.user_message();
        guard.progress_message = None;
        guard.last_error = Some(message.clone());
        guard.phase = SubmissionPhase::Failed(message);
        let snapshot = guard.snapshot();
        drop(guard);
        let _ = self.events.send(snapshot);
        true
    }

    async fn reset_after_success(&self) {
        let mut guard = self.inner.lock().await;
        if guard.closed || guard.phase != SubmissionPhase::Succeeded {
            return;
        }
        guard.candidate = None;
        guard.progress_message = None;
        guard.last_error = None;
        guard.phase = SubmissionPhase::Idle;
        let finished = guard.reset_task.take();
        let snapshot = guard.snapshot();
        drop(guard);
        debug!("submission reset after success");
        let _ = self.events.send(snapshot);
        drop(finished);
    }
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
