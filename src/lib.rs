//! Chunked video uploads for course chapters.
//!
//! [`services::upload_pipeline::UploadPipeline`] sends each selected file to
//! remote storage in fixed-size parts, completes the multipart upload,
//! resolves a playback URL and registers the video with a course chapter.
//! The remote side is reached through [`services::transport::UploadTransport`];
//! [`services::http_transport::HttpTransport`] is the `reqwest` implementation.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{TransportError, UploadError};
pub use models::{
    event::UploadEvent,
    local_file::LocalFile,
    target::TargetContext,
    upload_item::{UploadItem, UploadStatus},
};
pub use services::{
    upload_pipeline::{PipelineConfig, UploadPipeline},
    upload_queue::UploadQueue,
};
