//! Shared fixtures for integration tests: an in-memory transport that
//! records every call and can be told to misbehave for a given file.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use course_uploader::{
    TargetContext,
    errors::{TransportError, TransportResult},
    models::api::{
        AbortRequest, ChunkDestinationRequest, ChunkDestinationResponse, ChunkReceipt,
        CompleteRequest, CompleteResponse, InitiateRequest, InitiateResponse, PlaybackResponse,
        RegisterResourceRequest,
    },
    services::transport::UploadTransport,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

pub const MIB: usize = 1024 * 1024;

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initiate {
        file: String,
        content_type: String,
    },
    ChunkDestination {
        file: String,
        part: u32,
    },
    Transfer {
        file: String,
        part: u32,
        len: usize,
        content_type: String,
    },
    Complete {
        file: String,
        parts: Vec<u32>,
    },
    Playback {
        file: String,
    },
    Register {
        file: String,
        title: String,
        url: String,
        duration: u64,
        course: String,
        chapter: String,
    },
    Abort {
        file: String,
    },
}

impl Call {
    pub fn file(&self) -> &str {
        match self {
            Call::Initiate { file, .. }
            | Call::ChunkDestination { file, .. }
            | Call::Transfer { file, .. }
            | Call::Complete { file, .. }
            | Call::Playback { file }
            | Call::Register { file, .. }
            | Call::Abort { file } => file,
        }
    }
}

/// Failure switches, keyed by file name.
#[derive(Default)]
pub struct Behavior {
    pub fail_initiate: HashSet<String>,
    pub empty_upload_id: HashSet<String>,
    pub fail_destination: HashMap<String, u32>,
    pub fail_transfer: HashMap<String, u32>,
    pub missing_etag: HashMap<String, u32>,
    pub hang_transfer: HashMap<String, u32>,
    pub cancel_after_part: HashMap<String, (u32, CancellationToken)>,
    pub complete_without_id: HashSet<String>,
    pub fail_complete: HashSet<String>,
    pub fail_playback: HashSet<String>,
    pub empty_playback: HashSet<String>,
    pub fail_register: HashSet<String>,
}

#[derive(Default)]
pub struct FakeTransport {
    pub behavior: Behavior,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, file: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.file() == file)
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn key_for(file: &str) -> String {
    format!("uploads/{}", file)
}

fn file_from_key(key: &str) -> String {
    key.trim_start_matches("uploads/").to_string()
}

fn video_id_for(file: &str) -> String {
    format!("vid-{}", file)
}

fn part_url(file: &str, part: u32) -> String {
    format!("https://storage.test/{}?partNumber={}", key_for(file), part)
}

fn parse_part_url(url: &str) -> (String, u32) {
    let rest = url.trim_start_matches("https://storage.test/");
    let (key, query) = rest.split_once('?').unwrap();
    let part = query.trim_start_matches("partNumber=").parse().unwrap();
    (file_from_key(key), part)
}

fn status(code: u16, message: &str) -> TransportError {
    TransportError::Status {
        status: code,
        message: message.to_string(),
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    async fn initiate(&self, req: &InitiateRequest) -> TransportResult<InitiateResponse> {
        self.record(Call::Initiate {
            file: req.file_name.clone(),
            content_type: req.content_type.clone(),
        });
        if self.behavior.fail_initiate.contains(&req.file_name) {
            return Err(status(503, "storage unavailable"));
        }
        if self.behavior.empty_upload_id.contains(&req.file_name) {
            return Ok(InitiateResponse {
                upload_id: String::new(),
                key: key_for(&req.file_name),
            });
        }
        Ok(InitiateResponse {
            upload_id: format!("upload-{}", req.file_name),
            key: key_for(&req.file_name),
        })
    }

    async fn chunk_destination(
        &self,
        req: &ChunkDestinationRequest,
    ) -> TransportResult<ChunkDestinationResponse> {
        let file = file_from_key(&req.key);
        self.record(Call::ChunkDestination {
            file: file.clone(),
            part: req.part_number,
        });
        if self.behavior.fail_destination.get(&file) == Some(&req.part_number) {
            return Err(status(500, "signer down"));
        }
        Ok(ChunkDestinationResponse {
            url: part_url(&file, req.part_number),
        })
    }

    async fn transfer_chunk(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
    ) -> TransportResult<ChunkReceipt> {
        let (file, part) = parse_part_url(url);
        self.record(Call::Transfer {
            file: file.clone(),
            part,
            len: body.len(),
            content_type: content_type.to_string(),
        });

        if self.behavior.hang_transfer.get(&file) == Some(&part) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some((after, token)) = self.behavior.cancel_after_part.get(&file) {
            if *after == part {
                token.cancel();
            }
        }
        if self.behavior.fail_transfer.get(&file) == Some(&part) {
            return Ok(ChunkReceipt {
                status: 500,
                etag: None,
            });
        }
        if self.behavior.missing_etag.get(&file) == Some(&part) {
            return Ok(ChunkReceipt {
                status: 200,
                etag: None,
            });
        }
        Ok(ChunkReceipt {
            status: 200,
            etag: Some(format!("\"{:x}\"", md5::compute(&body))),
        })
    }

    async fn complete(&self, req: &CompleteRequest) -> TransportResult<CompleteResponse> {
        let file = file_from_key(&req.key);
        self.record(Call::Complete {
            file: file.clone(),
            parts: req.parts.iter().map(|p| p.part_number).collect(),
        });
        if self.behavior.fail_complete.contains(&file) {
            return Err(status(400, "InvalidPart"));
        }
        if self.behavior.complete_without_id.contains(&file) {
            return Ok(CompleteResponse { video_id: None });
        }
        Ok(CompleteResponse {
            video_id: Some(video_id_for(&file)),
        })
    }

    async fn resolve_playback(&self, video_id: &str) -> TransportResult<PlaybackResponse> {
        let file = video_id.trim_start_matches("vid-").to_string();
        self.record(Call::Playback { file: file.clone() });
        if self.behavior.fail_playback.contains(&file) {
            return Err(status(502, "transcoder unavailable"));
        }
        if self.behavior.empty_playback.contains(&file) {
            return Ok(PlaybackResponse { url: String::new() });
        }
        Ok(PlaybackResponse {
            url: format!("https://cdn.test/{}/index.m3u8", video_id),
        })
    }

    async fn register(
        &self,
        target: &TargetContext,
        req: &RegisterResourceRequest,
    ) -> TransportResult<()> {
        self.record(Call::Register {
            file: req.original_file_name.clone(),
            title: req.title.clone(),
            url: req.url.clone(),
            duration: req.original_duration,
            course: target.course_id.clone(),
            chapter: target.chapter_id.clone(),
        });
        if self.behavior.fail_register.contains(&req.original_file_name) {
            return Err(status(404, "chapter not found"));
        }
        Ok(())
    }

    async fn abort(&self, req: &AbortRequest) -> TransportResult<()> {
        self.record(Call::Abort {
            file: file_from_key(&req.key),
        });
        Ok(())
    }
}
