//! State-transition events emitted by the pipeline.

use serde::Serialize;
use uuid::Uuid;

/// One observable step of an upload. Callers fold these into their own
/// state; see `UploadQueue::apply`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Started {
        item_id: Uuid,
    },
    ChunkTransferred {
        item_id: Uuid,
        part_number: u32,
        total_chunks: u32,
        progress: u8,
    },
    Completed {
        item_id: Uuid,
        remote_id: String,
        playback_url: String,
    },
    Failed {
        item_id: Uuid,
        message: String,
    },
    /// `finished` items out of `total` have reached a terminal state.
    BatchProgress {
        finished: usize,
        total: usize,
    },
}

impl UploadEvent {
    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            UploadEvent::Started { item_id }
            | UploadEvent::ChunkTransferred { item_id, .. }
            | UploadEvent::Completed { item_id, .. }
            | UploadEvent::Failed { item_id, .. } => Some(*item_id),
            UploadEvent::BatchProgress { .. } => None,
        }
    }
}
