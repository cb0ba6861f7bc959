//! Error types for the upload pipeline and its transport.
//!
//! `UploadError` is what callers see per item. Every variant carries the item
//! name (and part number where it applies) so the message can be shown to
//! the user as-is.

use crate::models::upload_item::UploadStatus;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("`{item}` cannot be uploaded: {reason}")]
    InvalidFile { item: String, reason: String },

    #[error("could not start upload of `{item}`: {reason}")]
    InitiationFailed { item: String, reason: String },

    #[error("could not get a destination for part {part_number} of `{item}`: {reason}")]
    ChunkDestinationFailed {
        item: String,
        part_number: u32,
        reason: String,
    },

    #[error("transfer of part {part_number} of `{item}` failed: {reason}")]
    ChunkTransferFailed {
        item: String,
        part_number: u32,
        reason: String,
    },

    #[error("could not read part {part_number} of `{item}`: {source}")]
    SourceRead {
        item: String,
        part_number: u32,
        #[source]
        source: io::Error,
    },

    #[error("could not finalize upload of `{item}`: {reason}")]
    CompletionFailed { item: String, reason: String },

    #[error("could not resolve a playback URL for `{item}`: {reason}")]
    PlaybackResolutionFailed { item: String, reason: String },

    #[error("could not attach `{item}` to the chapter: {reason}")]
    RegistrationFailed { item: String, reason: String },

    #[error("upload of `{item}` was cancelled")]
    Cancelled { item: String },

    #[error("`{item}` cannot move from {from} to {to}")]
    InvalidTransition {
        item: String,
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("upload session for `{item}` rejected a part: {reason}")]
    SessionInvariant { item: String, reason: String },
}

impl UploadError {
    /// Part number the failure is attached to, if any.
    pub fn part_number(&self) -> Option<u32> {
        match self {
            UploadError::ChunkDestinationFailed { part_number, .. }
            | UploadError::ChunkTransferFailed { part_number, .. }
            | UploadError::SourceRead { part_number, .. } => Some(*part_number),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled { .. })
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
