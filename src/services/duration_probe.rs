//! Client-side duration probing before upload.
//!
//! Runs `ffprobe` against the file and reads the container duration. A
//! missing binary or an unreadable file yields `None`; the caller decides
//! what to register instead.

use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Duration of the media file at `path` in whole seconds (rounded).
pub async fn probe_duration_seconds(ffprobe: &str, path: &Path) -> Option<u64> {
    let output = match Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
    {
        Ok(output) => output,
        Err(err) => {
            debug!("could not run {}: {}", ffprobe, err);
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "{} failed for {}: {}",
            ffprobe,
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe`'s decimal seconds output, e.g. `"61.480000\n"`.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let seconds: f64 = raw.lines().next()?.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(seconds.round() as u64)
}
