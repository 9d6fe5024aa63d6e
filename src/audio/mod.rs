//! Audio acquisition for the speech-to-text fallback: download with yt-dlp,
//! then convert to the 16kHz mono PCM waveform whisper expects.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::extractors::youtube::YoutubeExtractor;
use crate::extractors::VideoId;
use crate::utils::failure_detail;
use crate::{Result, TranscriptError};

/// Sample rate of the waveform handed to the STT engine
pub const WAVEFORM_SAMPLE_RATE: u32 = 16_000;

/// Two-stage audio acquisition
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Download best available audio into `scratch_dir`. Fails with `Retrieval`.
    async fn download(
        &self,
        canonical_url: &str,
        video_id: &VideoId,
        scratch_dir: &Path,
    ) -> Result<PathBuf>;

    /// Convert `input` to `<scratch_dir>/<video_id>.wav`. Fails with `Transcription`.
    async fn convert_to_waveform(
        &self,
        input: &Path,
        scratch_dir: &Path,
        video_id: &VideoId,
    ) -> Result<PathBuf>;
}

/// yt-dlp download followed by ffmpeg conversion
pub struct AudioAcquirer {
    youtube: YoutubeExtractor,
    ffmpeg_path: String,
}

impl AudioAcquirer {
    pub fn new(youtube: YoutubeExtractor, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            youtube,
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl AudioSource for AudioAcquirer {
    async fn download(
        &self,
        canonical_url: &str,
        video_id: &VideoId,
        scratch_dir: &Path,
    ) -> Result<PathBuf> {
        let path = self
            .youtube
            .download_audio(canonical_url, video_id, scratch_dir)
            .await?;
        tracing::info!("Downloaded audio to {}", path.display());
        Ok(path)
    }

    async fn convert_to_waveform(
        &self,
        input: &Path,
        scratch_dir: &Path,
        video_id: &VideoId,
    ) -> Result<PathBuf> {
        let output_path = scratch_dir.join(format!("{}.wav", video_id));
        tracing::debug!(
            "Converting {} to {}",
            input.display(),
            output_path.display()
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(WAVEFORM_SAMPLE_RATE.to_string())
            .args(["-c:a", "pcm_s16le"])
            .arg(&output_path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TranscriptError::transcription(format!(
                        "{} is not installed or not on PATH",
                        self.ffmpeg_path
                    ))
                } else {
                    TranscriptError::transcription(format!(
                        "Failed to run {}: {}",
                        self.ffmpeg_path, e
                    ))
                }
            })?;

        if !output.status.success() {
            let detail = failure_detail(&output.stderr, &output.stdout, "Unknown ffmpeg error");
            return Err(TranscriptError::transcription(format!(
                "Audio preprocessing failed: {}",
                detail
            )));
        }

        if !output_path.is_file() {
            return Err(TranscriptError::transcription(
                "ffmpeg completed but output WAV file is missing",
            ));
        }

        Ok(output_path)
    }
}
