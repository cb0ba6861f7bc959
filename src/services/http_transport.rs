//! `reqwest`-backed implementation of [`UploadTransport`].
//!
//! API calls go to `{api_url}/...` with an optional bearer token. Raw chunk
//! transfers go to whatever URL the API handed out (usually a presigned
//! storage URL) and never carry the token.

use crate::{
    errors::{TransportError, TransportResult},
    models::{
        api::{
            AbortRequest, ChunkDestinationRequest, ChunkDestinationResponse, ChunkReceipt,
            CompleteRequest, CompleteResponse, InitiateRequest, InitiateResponse,
            PlaybackResponse, RegisterResourceRequest,
        },
        target::TargetContext,
    },
    services::transport::UploadTransport,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::{
    Client as HttpClient, Response, Url,
    header::{AUTHORIZATION, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("course-uploader/", env!("CARGO_PKG_VERSION"));
const CONTENT_MD5: &str = "content-md5";

/// Settings for [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Base URL of the course API, e.g. `https://api.example.com/v1/`.
    pub api_url: String,

    /// Bearer token for API calls.
    pub token: Option<String>,

    /// Send a `Content-MD5` header with each chunk so storage can reject
    /// corrupted parts.
    pub content_md5: bool,

    /// Client-wide ceiling on any single request.
    pub timeout: Duration,
}

/// HTTP client for the course API and its storage backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Base endpoint, always ending in `/`.
    endpoint: Url,

    /// Client for API calls, with auth headers.
    api: HttpClient,

    /// Client for raw chunk transfers, without auth headers.
    storage: HttpClient,

    content_md5: bool,
}

/// Error body the API sends on failures.
#[derive(Debug, Clone, Deserialize)]
struct StructuredApiError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> TransportResult<Self> {
        let mut base = config.api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base).map_err(|err| TransportError::InvalidUrl {
            url: config.api_url.clone(),
            reason: err.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl {
                url: config.api_url.clone(),
                reason: "URL cannot carry a path".into(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Some(token) = config.token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| TransportError::Other(format!("invalid API token: {}", err)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let api = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        let storage = HttpClient::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            endpoint,
            api,
            storage,
            content_md5: config.content_md5,
        })
    }

    /// Endpoint URL for the given path segments. Each segment is
    /// percent-encoded, so ids cannot escape their position in the path.
    fn url(&self, segments: &[&str]) -> TransportResult<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(TransportError::InvalidUrl {
                url: format!("{}{}", self.endpoint, segments.join("/")),
                reason: format!("`{}` is not a valid path segment", bad),
            });
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl {
                url: self.endpoint.to_string(),
                reason: "URL cannot carry a path".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B, R>(&self, path: &[&str], body: &B) -> TransportResult<R>
    where
        B: serde::Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let endpoint = self.url(path)?;
        debug!("POST {}", endpoint);
        let res = self.api.post(endpoint).json(body).send().await?;
        let res = ensure_success(res).await?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn initiate(&self, req: &InitiateRequest) -> TransportResult<InitiateResponse> {
        self.post_json(&["upload", "initiate"], req).await
    }

    async fn chunk_destination(
        &self,
        req: &ChunkDestinationRequest,
    ) -> TransportResult<ChunkDestinationResponse> {
        self.post_json(&["upload", "part-url"], req).await
    }

    async fn transfer_chunk(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
    ) -> TransportResult<ChunkReceipt> {
        let destination = Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        let mut req = self
            .storage
            .put(destination)
            .header(CONTENT_TYPE, content_type);
        if self.content_md5 {
            let digest = md5::compute(&body);
            req = req.header(CONTENT_MD5, general_purpose::STANDARD.encode(digest.0));
        }

        debug!("PUT {} bytes to storage", body.len());
        let res = req.body(body).send().await?;

        let status = res.status().as_u16();
        let etag = res
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(ChunkReceipt { status, etag })
    }

    async fn complete(&self, req: &CompleteRequest) -> TransportResult<CompleteResponse> {
        self.post_json(&["upload", "complete"], req).await
    }

    async fn resolve_playback(&self, video_id: &str) -> TransportResult<PlaybackResponse> {
        let endpoint = self.url(&["videos", video_id, "playback"])?;
        debug!("GET {}", endpoint);
        let res = self.api.get(endpoint).send().await?;
        let res = ensure_success(res).await?;
        Ok(res.json().await?)
    }

    async fn register(
        &self,
        target: &TargetContext,
        req: &RegisterResourceRequest,
    ) -> TransportResult<()> {
        let endpoint = self.url(&[
            "courses",
            &target.course_id,
            "chapters",
            &target.chapter_id,
            "resources",
        ])?;
        debug!("POST {}", endpoint);
        let res = self.api.post(endpoint).json(req).send().await?;
        ensure_success(res).await?;
        Ok(())
    }

    async fn abort(&self, req: &AbortRequest) -> TransportResult<()> {
        let endpoint = self.url(&["upload", "abort"])?;
        debug!("POST {}", endpoint);
        let res = self.api.post(endpoint).json(req).send().await?;
        ensure_success(res).await?;
        Ok(())
    }
}

/// Pass successful responses through; turn anything else into
/// `TransportError::Status`, decoding `{error, message}` bodies when present.
async fn ensure_success(res: Response) -> TransportResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let text = res.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<StructuredApiError>(&text) {
        Ok(body) if !body.message.is_empty() || !body.error.is_empty() => {
            format!("{}: {}", body.error, body.message)
        }
        _ => text,
    };

    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}
