//! UploadQueue — the caller-owned list of selected files.
//!
//! Holds every item the user selected, folds pipeline events into them and
//! renders the aggregate progress message. Items being uploaded cannot be
//! removed; everything else can. A batch in which every item completed
//! clears the list.

use crate::models::{
    event::UploadEvent,
    local_file::LocalFile,
    upload_item::{UploadItem, UploadStatus},
};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
    /// Ids handed out by the latest `pending()` call.
    batch_ids: HashSet<Uuid>,
    batch_total: usize,
    batch_finished: usize,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a selected file as a pending item. Returns its id.
    pub fn add(&mut self, file: LocalFile, duration_seconds: u64) -> Uuid {
        let item = UploadItem::new(file, duration_seconds);
        let id = item.id;
        self.items.push(item);
        id
    }

    /// Delete an item. Items that are currently uploading stay put.
    pub fn remove(&mut self, id: Uuid) -> Option<UploadItem> {
        let pos = self.items.iter().position(|item| item.id == id)?;
        if self.items[pos].status == UploadStatus::Uploading {
            debug!("refusing to remove `{}` while uploading", self.items[pos].name);
            return None;
        }
        Some(self.items.remove(pos))
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, id: Uuid) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of the pending items, in selection order, to hand to the
    /// pipeline. Starts a new batch and resets its counters.
    pub fn pending(&mut self) -> Vec<UploadItem> {
        let pending: Vec<UploadItem> = self
            .items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .cloned()
            .collect();
        self.batch_ids = pending.iter().map(|item| item.id).collect();
        self.batch_total = pending.len();
        self.batch_finished = 0;
        pending
    }

    /// Fold one pipeline event into the matching item.
    ///
    /// Events for unknown items (e.g. removed, or after the list was
    /// cleared) are dropped.
    pub fn apply(&mut self, event: &UploadEvent) {
        if let UploadEvent::BatchProgress { finished, total } = event {
            self.batch_finished = *finished;
            self.batch_total = *total;
            return;
        }

        let Some(id) = event.item_id() else {
            return;
        };
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            debug!("dropping event for unknown item {}", id);
            return;
        };

        let result = match event {
            UploadEvent::Started { .. } => item.mark_uploading(),
            UploadEvent::ChunkTransferred { progress, .. } => {
                item.set_progress(*progress);
                Ok(())
            }
            UploadEvent::Completed {
                remote_id,
                playback_url,
                ..
            } => item.mark_completed(remote_id.clone(), playback_url.clone()),
            UploadEvent::Failed { message, .. } => item.mark_failed(message.clone()),
            UploadEvent::BatchProgress { .. } => Ok(()),
        };
        if let Err(err) = result {
            debug!("ignoring event: {}", err);
        }
    }

    /// Replace items with the pipeline's final copies. If every item in the
    /// batch completed, the whole list is cleared.
    pub fn finish_batch(&mut self, results: Vec<UploadItem>) {
        let all_completed = !results.is_empty()
            && results
                .iter()
                .all(|item| item.status == UploadStatus::Completed);

        for result in results {
            if let Some(slot) = self.items.iter_mut().find(|item| item.id == result.id) {
                *slot = result;
            }
        }

        if all_completed {
            debug!("batch fully uploaded, clearing {} items", self.items.len());
            self.items.clear();
        }
    }

    /// Free-text progress line for the whole batch.
    pub fn progress_message(&self) -> String {
        if self.batch_total == 0 {
            return format!("{} file(s) selected", self.items.len());
        }

        let failed = self
            .items
            .iter()
            .filter(|item| {
                item.status == UploadStatus::Failed && self.batch_ids.contains(&item.id)
            })
            .count();
        let mut message = format!(
            "Uploaded {} of {} video(s)",
            self.batch_finished.saturating_sub(failed).min(self.batch_total),
            self.batch_total
        );
        if failed > 0 {
            message.push_str(&format!(", {} failed", failed));
        }
        if let Some(current) = self
            .items
            .iter()
            .find(|item| item.status == UploadStatus::Uploading)
        {
            message.push_str(&format!(" (uploading {}: {}%)", current.name, current.progress));
        }
        message
    }
}
