use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;
use crate::extractors::VideoId;
use crate::{Result, TranscriptError};

/// Human-readable reason for a failed external process.
///
/// Prefers stderr, then stdout, then `fallback`.
pub fn failure_detail(stderr: &[u8], stdout: &[u8], fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let (stderr, stdout) = (stderr.trim(), stdout.trim());
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        fallback.to_string()
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check if the current environment has the configured tools
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.tools.yt_dlp).await {
        missing.push(format!(
            "{} - required for captions and audio download",
            config.tools.yt_dlp
        ));
    }

    if !check_command_available(&config.tools.ffmpeg).await {
        missing.push(format!(
            "{} - required for the speech-to-text fallback",
            config.tools.ffmpeg
        ));
    }

    // whisper-cli has no --version flag; --help exits zero
    if !check_command_with_arg(&config.tools.whisper, "--help").await {
        missing.push(format!(
            "{} - required for the speech-to-text fallback",
            config.tools.whisper
        ));
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    check_command_with_arg(command, "--version").await
}

async fn check_command_with_arg(command: &str, arg: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Per-run scratch directory for intermediate audio files.
///
/// Removed when dropped, on every exit path, unless it was created with
/// `keep` set; a kept directory is left on disk for inspection.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    /// Create `yt_transcript_<id>_XXXXXX` under `root` (system temp dir when `None`)
    pub fn create(root: Option<&Path>, video_id: &VideoId, keep: bool) -> Result<Self> {
        let prefix = format!("yt_transcript_{}_", video_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let created = match root {
            Some(root) => fs_err::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
            None => builder.tempdir(),
        };
        let dir = created.map_err(|e| {
            TranscriptError::retrieval(format!("Unable to create temporary directory: {}", e))
        })?;

        let path = dir.path().to_path_buf();
        tracing::debug!("Created scratch directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_kept(&self) -> bool {
        self.keep
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let kept = dir.into_path();
            tracing::debug!("Keeping scratch directory {}", kept.display());
        } else if let Err(e) = dir.close() {
            tracing::warn!("Failed to remove scratch directory {}: {}", self.path.display(), e);
        }
    }
}
