use anyhow::{Context, Result};
use course_uploader::{
    LocalFile, UploadPipeline, UploadQueue, UploadStatus,
    config::AppConfig,
    services::{duration_probe::probe_duration_seconds, http_transport::HttpTransport},
};
use std::{process::ExitCode, sync::Arc};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting course-uploader with config: {:?}", cfg);

    // --- Select files ---
    let mut queue = UploadQueue::new();
    for path in &cfg.files {
        let file = LocalFile::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;

        let duration = if cfg.probe_duration {
            match probe_duration_seconds(&cfg.ffprobe, path).await {
                Some(seconds) => seconds,
                None => {
                    tracing::warn!(
                        "Could not read the duration of {}; registering 0s",
                        path.display()
                    );
                    0
                }
            }
        } else {
            0
        };

        tracing::info!(
            "Selected {} ({} bytes, {}s)",
            file.name,
            file.size_bytes,
            duration
        );
        queue.add(file, duration);
    }

    // --- Build pipeline ---
    let transport =
        Arc::new(HttpTransport::new(cfg.transport_config()).context("building HTTP client")?);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pipeline = UploadPipeline::new(transport, cfg.pipeline_config()).with_events(events_tx);

    // --- Ctrl-C stops issuing further parts ---
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping after the current request");
                cancel.cancel();
            }
        });
    }

    // --- Fold events into the queue while the batch runs ---
    let pending = queue.pending();
    let queue = Arc::new(Mutex::new(queue));
    let reporter = {
        let queue = queue.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let mut queue = queue.lock().await;
                queue.apply(&event);
                tracing::info!("{}", queue.progress_message());
            }
        })
    };

    let target = cfg.target();
    let results = pipeline.upload_batch(pending, &target, &cancel).await;

    // Dropping the pipeline closes the event channel so the reporter ends.
    drop(pipeline);
    reporter.await.context("event reporter stopped unexpectedly")?;

    // --- Summary ---
    let mut failed = 0usize;
    for item in &results {
        match item.status {
            UploadStatus::Completed => tracing::info!(
                "{}: completed ({})",
                item.name,
                item.playback_url.as_deref().unwrap_or_default()
            ),
            UploadStatus::Failed => {
                failed += 1;
                tracing::error!(
                    "{}: failed: {}",
                    item.name,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
            status => {
                failed += 1;
                tracing::warn!("{}: {}", item.name, status);
            }
        }
    }

    let mut queue = queue.lock().await;
    queue.finish_batch(results);
    tracing::info!("{}", queue.progress_message());

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
