//! The seam between the pipeline and the remote course API and storage.

use crate::{
    errors::TransportResult,
    models::{
        api::{
            AbortRequest, ChunkDestinationRequest, ChunkDestinationResponse, ChunkReceipt,
            CompleteRequest, CompleteResponse, InitiateRequest, InitiateResponse,
            PlaybackResponse, RegisterResourceRequest,
        },
        target::TargetContext,
    },
};
use async_trait::async_trait;
use bytes::Bytes;

/// Remote operations the upload pipeline drives, one method per call.
///
/// Implementations only move bytes and JSON; deciding whether a response is
/// usable (empty tokens, missing ETags, empty URLs) is left to the pipeline.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Open a multipart upload session.
    async fn initiate(&self, req: &InitiateRequest) -> TransportResult<InitiateResponse>;

    /// Ask where a single part should be sent.
    async fn chunk_destination(
        &self,
        req: &ChunkDestinationRequest,
    ) -> TransportResult<ChunkDestinationResponse>;

    /// Send raw part bytes to a destination URL.
    ///
    /// A non-success status is returned in the receipt, not as an error, so
    /// the caller can report it alongside the part number.
    async fn transfer_chunk(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
    ) -> TransportResult<ChunkReceipt>;

    /// Assemble the uploaded parts into the final object.
    async fn complete(&self, req: &CompleteRequest) -> TransportResult<CompleteResponse>;

    /// Look up the streamable URL for an assembled video.
    async fn resolve_playback(&self, video_id: &str) -> TransportResult<PlaybackResponse>;

    /// Attach a playable resource to a course chapter.
    async fn register(
        &self,
        target: &TargetContext,
        req: &RegisterResourceRequest,
    ) -> TransportResult<()>;

    /// Discard an unfinished multipart upload and its parts.
    async fn abort(&self, req: &AbortRequest) -> TransportResult<()>;
}
