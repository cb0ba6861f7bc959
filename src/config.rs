use crate::{
    models::{target::TargetContext, upload_session::DEFAULT_CHUNK_SIZE},
    services::{http_transport::HttpTransportConfig, upload_pipeline::PipelineConfig},
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "COURSE_UPLOADER_";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub course_id: String,
    pub chapter_id: String,
    pub title: Option<String>,
    pub chunk_size: u64,
    pub request_timeout: Duration,
    pub transfer_timeout: Duration,
    pub max_concurrent_items: usize,
    pub abort_on_failure: bool,
    pub content_md5: bool,
    pub ffprobe: String,
    pub probe_duration: bool,
    pub files: Vec<PathBuf>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Upload course videos to a chapter in chunks")]
pub struct Args {
    /// Video files to upload, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Base URL of the course API (overrides COURSE_UPLOADER_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token for the course API (overrides COURSE_UPLOADER_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Course the chapter belongs to (overrides COURSE_UPLOADER_COURSE_ID)
    #[arg(long)]
    pub course_id: Option<String>,

    /// Chapter to attach the videos to (overrides COURSE_UPLOADER_CHAPTER_ID)
    #[arg(long)]
    pub chapter_id: Option<String>,

    /// Resource title; defaults to each file's name without extension
    #[arg(long)]
    pub title: Option<String>,

    /// Part size in bytes (overrides COURSE_UPLOADER_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Timeout for API calls, in seconds (overrides COURSE_UPLOADER_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Timeout for each part transfer, in seconds (overrides COURSE_UPLOADER_TRANSFER_TIMEOUT_SECS)
    #[arg(long)]
    pub transfer_timeout_secs: Option<u64>,

    /// Files uploaded at once (overrides COURSE_UPLOADER_CONCURRENCY)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Discard the remote multipart upload when a file fails
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Send a Content-MD5 header with every part
    #[arg(long)]
    pub content_md5: bool,

    /// ffprobe binary used to read video durations (overrides COURSE_UPLOADER_FFPROBE)
    #[arg(long)]
    pub ffprobe: Option<String>,

    /// Skip duration probing and register a duration of 0
    #[arg(long)]
    pub no_probe: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge parsed args over values read through `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_api_url = env_string(&lookup, "API_URL")?;
        let env_token = env_string(&lookup, "TOKEN")?;
        let env_course = env_string(&lookup, "COURSE_ID")?;
        let env_chapter = env_string(&lookup, "CHAPTER_ID")?;
        let env_chunk_size = env_parse(&lookup, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let env_request_timeout = env_parse(&lookup, "REQUEST_TIMEOUT_SECS", 60u64)?;
        let env_transfer_timeout = env_parse(&lookup, "TRANSFER_TIMEOUT_SECS", 300u64)?;
        let env_concurrency = env_parse(&lookup, "CONCURRENCY", 1usize)?;
        let env_ffprobe = env_string(&lookup, "FFPROBE")?.unwrap_or_else(|| "ffprobe".into());

        // --- Merge ---
        let Some(api_url) = args.api_url.or(env_api_url) else {
            bail!("missing API URL: pass --api-url or set {}API_URL", ENV_PREFIX);
        };
        let Some(course_id) = args.course_id.or(env_course) else {
            bail!("missing course: pass --course-id or set {}COURSE_ID", ENV_PREFIX);
        };
        let Some(chapter_id) = args.chapter_id.or(env_chapter) else {
            bail!("missing chapter: pass --chapter-id or set {}CHAPTER_ID", ENV_PREFIX);
        };

        let chunk_size = args.chunk_size.unwrap_or(env_chunk_size);
        if chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }
        let max_concurrent_items = args.concurrency.unwrap_or(env_concurrency);
        if max_concurrent_items == 0 {
            bail!("concurrency must be at least 1");
        }

        Ok(Self {
            api_url,
            token: args.token.or(env_token),
            course_id,
            chapter_id,
            title: args.title,
            chunk_size,
            request_timeout: Duration::from_secs(
                args.request_timeout_secs.unwrap_or(env_request_timeout),
            ),
            transfer_timeout: Duration::from_secs(
                args.transfer_timeout_secs.unwrap_or(env_transfer_timeout),
            ),
            max_concurrent_items,
            abort_on_failure: args.abort_on_failure,
            content_md5: args.content_md5,
            ffprobe: args.ffprobe.unwrap_or(env_ffprobe),
            probe_duration: !args.no_probe,
            files: args.files,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            request_timeout: self.request_timeout,
            transfer_timeout: self.transfer_timeout,
            max_concurrent_items: self.max_concurrent_items,
            abort_on_failure: self.abort_on_failure,
        }
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            content_md5: self.content_md5,
            timeout: self.request_timeout.max(self.transfer_timeout),
        }
    }

    pub fn target(&self) -> TargetContext {
        let target = TargetContext::new(self.course_id.clone(), self.chapter_id.clone());
        match &self.title {
            Some(title) => target.with_title(title.clone()),
            None => target,
        }
    }
}

fn env_string<F>(lookup: &F, key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    match lookup(&name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: Display,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    match env_string(lookup, key)? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["course-uploader"];
        argv.extend_from_slice(extra);
        argv.push("intro.mp4");
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn env_supplies_defaults() {
        let cfg = AppConfig::resolve(
            args(&[]),
            lookup(&[
                ("COURSE_UPLOADER_API_URL", "https://api.example.com"),
                ("COURSE_UPLOADER_COURSE_ID", "c1"),
                ("COURSE_UPLOADER_CHAPTER_ID", "ch1"),
                ("COURSE_UPLOADER_CONCURRENCY", "2"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.api_url, "https://api.example.com");
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.max_concurrent_items, 2);
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
        assert_eq!(cfg.ffprobe, "ffprobe");
        assert!(cfg.probe_duration);
        assert_eq!(cfg.files, vec![PathBuf::from("intro.mp4")]);
        assert_eq!(cfg.target(), TargetContext::new("c1", "ch1"));
    }

    #[test]
    fn args_override_env() {
        let cfg = AppConfig::resolve(
            args(&[
                "--api-url",
                "http://localhost:3000",
                "--chapter-id",
                "ch9",
                "--chunk-size",
                "1024",
                "--title",
                "Welcome",
                "--abort-on-failure",
                "--no-probe",
            ]),
            lookup(&[
                ("COURSE_UPLOADER_API_URL", "https://api.example.com"),
                ("COURSE_UPLOADER_COURSE_ID", "c1"),
                ("COURSE_UPLOADER_CHAPTER_ID", "ch1"),
                ("COURSE_UPLOADER_CHUNK_SIZE", "2048"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.api_url, "http://localhost:3000");
        assert_eq!(cfg.chapter_id, "ch9");
        assert_eq!(cfg.chunk_size, 1024);
        assert!(cfg.abort_on_failure);
        assert!(!cfg.probe_duration);
        assert_eq!(cfg.target().title.as_deref(), Some("Welcome"));
        assert!(cfg.pipeline_config().abort_on_failure);
    }

    #[test]
    fn invalid_numbers_are_reported_with_the_variable_name() {
        let err = AppConfig::resolve(
            args(&["--api-url", "http://x", "--course-id", "c", "--chapter-id", "ch"]),
            lookup(&[("COURSE_UPLOADER_CHUNK_SIZE", "ten")]),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("COURSE_UPLOADER_CHUNK_SIZE"));
    }

    #[test]
    fn missing_target_is_an_error() {
        let err = AppConfig::resolve(args(&["--api-url", "http://x"]), lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("course"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = AppConfig::resolve(
            args(&[
                "--api-url",
                "http://x",
                "--course-id",
                "c",
                "--chapter-id",
                "ch",
                "--chunk-size",
                "0",
            ]),
            lookup(&[]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }
}
