//! src/services/upload_pipeline.rs
//!
//! UploadPipeline — drives local files through the multipart upload
//! protocol: initiate, then for every part fetch a destination and PUT the
//! bytes, then complete, resolve the playback URL and register the video
//! with its course chapter. Each remote call is bounded by a timeout and
//! races the caller's cancellation token.
//!
//! Failures are contained per item: the item ends `Failed` with a message
//! and a batch moves on to the next one.

use crate::{
    errors::{TransportError, TransportResult, UploadError, UploadResult},
    models::{
        api::{
            AbortRequest, ChunkDestinationRequest, CompleteRequest, InitiateRequest,
            RegisterResourceRequest,
        },
        event::UploadEvent,
        local_file::ChunkReader,
        target::TargetContext,
        upload_item::{UploadItem, UploadStatus},
        upload_session::{ChunkPlan, DEFAULT_CHUNK_SIZE, UploadSession, total_chunks},
    },
    services::transport::UploadTransport,
};
use futures::{StreamExt, stream};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resource type sent when registering an uploaded video.
const RESOURCE_TYPE_VIDEO: &str = "video";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Bytes per part. The last part carries the remainder.
    pub chunk_size: u64,

    /// Timeout for each API call (initiate, part URL, complete, playback,
    /// register, abort).
    pub request_timeout: Duration,

    /// Timeout for each raw part transfer.
    pub transfer_timeout: Duration,

    /// Items uploaded at once within a batch. Parts of one item are always
    /// sent in order.
    pub max_concurrent_items: usize,

    /// Discard the remote multipart upload when an item fails before it
    /// was completed.
    pub abort_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(300),
            max_concurrent_items: 1,
            abort_on_failure: false,
        }
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    transport: Arc<dyn UploadTransport>,
    config: PipelineConfig,
    events: Option<UnboundedSender<UploadEvent>>,
}

/// What a finished transfer hands back for the item.
struct Delivered {
    remote_id: String,
    playback_url: String,
}

impl UploadPipeline {
    pub fn new(transport: Arc<dyn UploadTransport>, config: PipelineConfig) -> Self {
        Self {
            transport,
            config,
            events: None,
        }
    }

    /// Send every state transition to `sender`. A dropped receiver is
    /// ignored.
    pub fn with_events(mut self, sender: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Upload a single pending item and attach it to `target`.
    ///
    /// Returns the item in `Completed` state, or the error that failed it.
    pub async fn upload_one(
        &self,
        mut item: UploadItem,
        target: &TargetContext,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadItem> {
        self.run_item(&mut item, target, cancel).await?;
        Ok(item)
    }

    /// Upload `items` in order.
    ///
    /// Every pending item ends `Completed` or `Failed`; a failure never stops
    /// the batch. Items that are not pending are returned untouched. After
    /// `cancel` fires, items that have not started stay `Pending`.
    pub async fn upload_batch(
        &self,
        items: Vec<UploadItem>,
        target: &TargetContext,
        cancel: &CancellationToken,
    ) -> Vec<UploadItem> {
        let total = items.len();
        let finished = AtomicUsize::new(0);
        let parallelism = self.config.max_concurrent_items.max(1);

        info!("Starting batch of {} uploads ({} at a time)", total, parallelism);

        let results: Vec<UploadItem> = stream::iter(items)
            .map(|item| self.process_batch_item(item, target, cancel, &finished, total))
            .buffered(parallelism)
            .collect()
            .await;

        let completed = results
            .iter()
            .filter(|item| item.status == UploadStatus::Completed)
            .count();
        info!("Batch finished: {} of {} uploads completed", completed, total);

        results
    }

    async fn process_batch_item(
        &self,
        mut item: UploadItem,
        target: &TargetContext,
        cancel: &CancellationToken,
        finished: &AtomicUsize,
        total: usize,
    ) -> UploadItem {
        if item.status != UploadStatus::Pending {
            warn!("Skipping `{}`: already {}", item.name, item.status);
            return item;
        }

        match self.run_item(&mut item, target, cancel).await {
            Ok(()) => {}
            Err(err) if item.status == UploadStatus::Pending => {
                debug!("`{}` not started: {}", item.name, err);
                return item;
            }
            Err(_) => {}
        }

        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(UploadEvent::BatchProgress {
            finished: done,
            total,
        });
        item
    }

    /// Run the whole protocol for one item, moving it through its states.
    async fn run_item(
        &self,
        item: &mut UploadItem,
        target: &TargetContext,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled {
                item: item.name.clone(),
            });
        }

        item.mark_uploading()?;
        self.emit(UploadEvent::Started { item_id: item.id });
        info!(
            "Uploading `{}` ({} bytes, {})",
            item.name, item.size_bytes, item.content_type
        );

        let token = cancel.child_token();
        match self.transfer(item, target, &token).await {
            Ok(delivered) => {
                item.mark_completed(delivered.remote_id.clone(), delivered.playback_url.clone())?;
                info!("Uploaded `{}` as {}", item.name, delivered.remote_id);
                self.emit(UploadEvent::Completed {
                    item_id: item.id,
                    remote_id: delivered.remote_id,
                    playback_url: delivered.playback_url,
                });
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!("{}", message);
                item.mark_failed(message.clone())?;
                self.emit(UploadEvent::Failed {
                    item_id: item.id,
                    message,
                });
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        item: &mut UploadItem,
        target: &TargetContext,
        cancel: &CancellationToken,
    ) -> UploadResult<Delivered> {
        if item.size_bytes == 0 {
            return Err(UploadError::InvalidFile {
                item: item.name.clone(),
                reason: "file is empty".into(),
            });
        }

        let name = item.name.clone();

        // Reject oversized plans before a remote session exists.
        total_chunks(item.size_bytes, self.config.chunk_size).map_err(|reason| {
            UploadError::InvalidFile {
                item: name.clone(),
                reason,
            }
        })?;

        // Open the source before touching the API so a missing file never
        // leaves a dangling remote session.
        let mut reader = item
            .file
            .reader()
            .await
            .map_err(|err| UploadError::InvalidFile {
                item: name.clone(),
                reason: err.to_string(),
            })?;

        let initiated = self
            .call(
                cancel,
                self.config.request_timeout,
                &name,
                self.transport.initiate(&InitiateRequest {
                    file_name: item.name.clone(),
                    content_type: item.content_type.clone(),
                }),
                |reason| UploadError::InitiationFailed {
                    item: name.clone(),
                    reason,
                },
            )
            .await?;

        if initiated.upload_id.trim().is_empty() || initiated.key.trim().is_empty() {
            return Err(UploadError::InitiationFailed {
                item: name.clone(),
                reason: "no upload session token returned".into(),
            });
        }

        let mut session = UploadSession::new(
            initiated.upload_id,
            initiated.key,
            item.size_bytes,
            self.config.chunk_size,
        )
        .map_err(|reason| UploadError::SessionInvariant {
            item: name.clone(),
            reason,
        })?;
        debug!(
            "`{}`: session {} for {} parts",
            name, session.upload_id, session.total_chunks
        );

        let video_id = match self.send_parts(item, &mut reader, &mut session, cancel).await {
            Ok(video_id) => video_id,
            Err(err) => {
                self.abort_if_configured(&session).await;
                return Err(err);
            }
        };
        drop(reader);

        let playback = self
            .call(
                cancel,
                self.config.request_timeout,
                &name,
                self.transport.resolve_playback(&video_id),
                |reason| UploadError::PlaybackResolutionFailed {
                    item: name.clone(),
                    reason,
                },
            )
            .await?;
        if playback.url.trim().is_empty() {
            return Err(UploadError::PlaybackResolutionFailed {
                item: name.clone(),
                reason: "empty playback URL".into(),
            });
        }

        let register = RegisterResourceRequest {
            title: target.title_for(item.file.stem()).to_string(),
            resource_type: RESOURCE_TYPE_VIDEO.into(),
            url: playback.url.clone(),
            original_file_name: item.name.clone(),
            original_duration: item.duration_seconds,
        };
        self.call(
            cancel,
            self.config.request_timeout,
            &name,
            self.transport.register(target, &register),
            |reason| UploadError::RegistrationFailed {
                item: name.clone(),
                reason,
            },
        )
        .await?;

        Ok(Delivered {
            remote_id: video_id,
            playback_url: playback.url,
        })
    }

    /// Send every part in order, then complete the upload. Returns the
    /// identifier of the assembled video.
    async fn send_parts(
        &self,
        item: &mut UploadItem,
        reader: &mut ChunkReader,
        session: &mut UploadSession,
        cancel: &CancellationToken,
    ) -> UploadResult<String> {
        let name = item.name.clone();

        for chunk in ChunkPlan::new(item.size_bytes, self.config.chunk_size) {
            let part_number = chunk.part_number;
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled { item: name.clone() });
            }

            let body = reader
                .next_chunk(chunk.len as usize)
                .await
                .map_err(|source| UploadError::SourceRead {
                    item: name.clone(),
                    part_number,
                    source,
                })?;

            let destination = self
                .call(
                    cancel,
                    self.config.request_timeout,
                    &name,
                    self.transport.chunk_destination(&ChunkDestinationRequest {
                        key: session.object_key.clone(),
                        upload_id: session.upload_id.clone(),
                        part_number,
                    }),
                    |reason| UploadError::ChunkDestinationFailed {
                        item: name.clone(),
                        part_number,
                        reason,
                    },
                )
                .await?;
            if destination.url.trim().is_empty() {
                return Err(UploadError::ChunkDestinationFailed {
                    item: name.clone(),
                    part_number,
                    reason: "empty destination URL".into(),
                });
            }

            let receipt = self
                .call(
                    cancel,
                    self.config.transfer_timeout,
                    &name,
                    self.transport
                        .transfer_chunk(&destination.url, &item.content_type, body),
                    |reason| UploadError::ChunkTransferFailed {
                        item: name.clone(),
                        part_number,
                        reason,
                    },
                )
                .await?;

            if !(200..300).contains(&receipt.status) {
                return Err(UploadError::ChunkTransferFailed {
                    item: name.clone(),
                    part_number,
                    reason: format!("storage answered HTTP {}", receipt.status),
                });
            }
            // A success status without an ETag may be a partial write
            // accepted by an intermediary.
            let etag = match receipt.etag.filter(|tag| !tag.trim().is_empty()) {
                Some(tag) => tag,
                None => {
                    return Err(UploadError::ChunkTransferFailed {
                        item: name.clone(),
                        part_number,
                        reason: "storage returned no ETag".into(),
                    });
                }
            };

            session
                .record_part(part_number, etag)
                .map_err(|reason| UploadError::SessionInvariant {
                    item: name.clone(),
                    reason,
                })?;

            let progress = session.progress();
            item.set_progress(progress);
            debug!(
                "`{}`: part {}/{} done ({}%)",
                name, part_number, session.total_chunks, progress
            );
            self.emit(UploadEvent::ChunkTransferred {
                item_id: item.id,
                part_number,
                total_chunks: session.total_chunks,
                progress,
            });
        }

        if !session.is_complete() {
            return Err(UploadError::SessionInvariant {
                item: name.clone(),
                reason: format!(
                    "{} of {} parts recorded",
                    session.completed_parts().len(),
                    session.total_chunks
                ),
            });
        }

        let completed = self
            .call(
                cancel,
                self.config.request_timeout,
                &name,
                self.transport.complete(&CompleteRequest {
                    key: session.object_key.clone(),
                    upload_id: session.upload_id.clone(),
                    parts: session.completed_parts().to_vec(),
                }),
                |reason| UploadError::CompletionFailed {
                    item: name.clone(),
                    reason,
                },
            )
            .await?;

        match completed.video_id.filter(|id| !id.trim().is_empty()) {
            Some(video_id) => Ok(video_id),
            None => Err(UploadError::CompletionFailed {
                item: name.clone(),
                reason: "no resource identifier returned".into(),
            }),
        }
    }

    /// Discard the remote multipart upload if configured to. Errors are
    /// logged only; the item keeps its original failure.
    async fn abort_if_configured(&self, session: &UploadSession) {
        if !self.config.abort_on_failure {
            return;
        }

        let req = AbortRequest {
            key: session.object_key.clone(),
            upload_id: session.upload_id.clone(),
        };
        match tokio::time::timeout(self.config.request_timeout, self.transport.abort(&req)).await
        {
            Ok(Ok(())) => debug!("aborted multipart upload {}", session.upload_id),
            Ok(Err(err)) => warn!(
                "failed to abort multipart upload {}: {}",
                session.upload_id, err
            ),
            Err(_) => warn!(
                "aborting multipart upload {} timed out",
                session.upload_id
            ),
        }
    }

    /// Await one remote call, bounded by `limit` and cancellable.
    ///
    /// Transport errors and timeouts become the step's error through `fail`.
    async fn call<T, F>(
        &self,
        cancel: &CancellationToken,
        limit: Duration,
        item: &str,
        fut: F,
        fail: impl FnOnce(String) -> UploadError,
    ) -> UploadResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled { item: item.to_string() }),
            res = tokio::time::timeout(limit, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(fail(err.to_string())),
                Err(_) => Err(fail(TransportError::Timeout(limit).to_string())),
            },
        }
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
