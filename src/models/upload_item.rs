//! Represents one file queued for transfer and its lifecycle.

use crate::{
    errors::{UploadError, UploadResult},
    models::local_file::LocalFile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of an [`UploadItem`].
///
/// Transitions only go `Pending -> Uploading -> {Completed, Failed}`.
/// `Completed` and `Failed` are terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Uploading)
                | (UploadStatus::Uploading, UploadStatus::Completed)
                | (UploadStatus::Uploading, UploadStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadStatus::Pending => "Pending",
            UploadStatus::Uploading => "Uploading",
            UploadStatus::Completed => "Completed",
            UploadStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// A file selected for upload, plus everything the pipeline learns about it.
#[derive(Serialize, Clone, Debug)]
pub struct UploadItem {
    /// Local identifier, used to correlate pipeline events.
    pub id: Uuid,

    /// Original file name.
    pub name: String,

    /// MIME type of the file.
    pub content_type: String,

    /// File size in bytes.
    pub size_bytes: u64,

    /// Duration probed before upload, in whole seconds.
    pub duration_seconds: u64,

    /// Current lifecycle state.
    pub status: UploadStatus,

    /// Percentage of chunks transferred (0–100).
    pub progress: u8,

    /// Resource identifier issued by storage. Set only once completed.
    pub remote_id: Option<String>,

    /// Streamable URL of the assembled video. Set only once completed.
    pub playback_url: Option<String>,

    /// Human-readable failure message. Set only once failed.
    pub error: Option<String>,

    /// When the file was selected.
    pub created_at: DateTime<Utc>,

    /// When the item reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub file: LocalFile,
}

impl UploadItem {
    /// Create a pending item for a selected file.
    pub fn new(file: LocalFile, duration_seconds: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            size_bytes: file.size_bytes,
            duration_seconds,
            status: UploadStatus::Pending,
            progress: 0,
            remote_id: None,
            playback_url: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
            file,
        }
    }

    fn transition(&mut self, next: UploadStatus) -> UploadResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(UploadError::InvalidTransition {
                item: self.name.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn mark_uploading(&mut self) -> UploadResult<()> {
        self.transition(UploadStatus::Uploading)
    }

    /// Record chunk progress. Values never go backwards.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    pub fn mark_completed(
        &mut self,
        remote_id: impl Into<String>,
        playback_url: impl Into<String>,
    ) -> UploadResult<()> {
        self.transition(UploadStatus::Completed)?;
        self.remote_id = Some(remote_id.into());
        self.playback_url = Some(playback_url.into());
        self.progress = 100;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> UploadResult<()> {
        self.transition(UploadStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}
