//! Request and response bodies exchanged with the course API.
//!
//! Field names follow the API's camelCase JSON. Only the completion call's
//! part list uses storage-style names (see [`CompletedPart`]).

use crate::models::upload_session::CompletedPart;
use serde::{Deserialize, Serialize};

/// `POST /upload/initiate`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub key: String,
}

/// `POST /upload/part-url`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDestinationRequest {
    pub key: String,
    pub upload_id: String,
    pub part_number: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChunkDestinationResponse {
    #[serde(default)]
    pub url: String,
}

/// What storage answered to a raw chunk `PUT`.
#[derive(Clone, Debug, Default)]
pub struct ChunkReceipt {
    pub status: u16,

    /// `ETag` response header, if storage sent one.
    pub etag: Option<String>,
}

/// `POST /upload/complete`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    /// Identifier of the assembled stream.
    #[serde(default, alias = "resourceId")]
    pub video_id: Option<String>,
}

/// `GET /videos/{videoId}/playback`
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlaybackResponse {
    #[serde(default)]
    pub url: String,
}

/// `POST /courses/{courseId}/chapters/{chapterId}/resources`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResourceRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: String,
    pub original_file_name: String,
    /// Duration in whole seconds.
    pub original_duration: u64,
}

/// `POST /upload/abort`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AbortRequest {
    pub key: String,
    pub upload_id: String,
}
