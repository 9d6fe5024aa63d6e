use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::VideoId;
use crate::utils::failure_detail;
use crate::{Result, TranscriptError};

/// Subset of the `yt-dlp --dump-json` document used here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    /// Manually authored subtitle tracks keyed by language code.
    /// Auto-generated tracks live under `automatic_captions` and are not read.
    #[serde(default)]
    pub subtitles: Option<BTreeMap<String, Vec<SubtitleFormat>>>,
}

/// One downloadable rendition of a subtitle track
#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleFormat {
    pub ext: Option<String>,
    pub url: Option<String>,
}

impl VideoInfo {
    /// Renditions of the manual track for `language`, if one exists
    pub fn manual_track(&self, language: &str) -> Option<&[SubtitleFormat]> {
        self.subtitles
            .as_ref()?
            .get(language)
            .map(Vec::as_slice)
            .filter(|formats| !formats.is_empty())
    }

    pub fn manual_languages(&self) -> Vec<&str> {
        self.subtitles
            .as_ref()
            .map(|subs| subs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// YouTube access through the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YoutubeExtractor {
    yt_dlp_path: String,
}

impl YoutubeExtractor {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Get video information (including the subtitle listing) using yt-dlp
    pub async fn get_video_info(&self, url: &str) -> Result<VideoInfo> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let detail = failure_detail(&output.stderr, &output.stdout, "unknown yt-dlp error");
            return Err(TranscriptError::retrieval(format!("yt-dlp failed: {}", detail)));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            TranscriptError::retrieval(format!("Unable to parse yt-dlp metadata: {}", e))
        })
    }

    /// Download the best available audio stream into `scratch_dir`.
    ///
    /// The file is named `<video_id>.<ext>`, where the extension is whatever
    /// container YouTube served.
    pub async fn download_audio(
        &self,
        canonical_url: &str,
        video_id: &VideoId,
        scratch_dir: &Path,
    ) -> Result<PathBuf> {
        fs_err::create_dir_all(scratch_dir)
            .map_err(|e| TranscriptError::retrieval(format!("Failed to download audio: {}", e)))?;

        let template = scratch_dir.join(format!("{}.%(ext)s", video_id));
        tracing::debug!("Downloading audio for {} to {}", canonical_url, template.display());

        let output = Command::new(&self.yt_dlp_path)
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--output")
            .arg(&template)
            .args(["--no-playlist", "--no-warnings", "--no-progress"])
            .args(["--print", "after_move:filepath"])
            .arg(canonical_url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let detail = failure_detail(&output.stderr, &output.stdout, "unknown yt-dlp error");
            return Err(TranscriptError::retrieval(format!(
                "Failed to download audio: {}",
                detail
            )));
        }

        let printed = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from);

        let downloaded = match printed {
            Some(path) if path.is_file() => Some(path),
            _ => find_downloaded_file(scratch_dir, video_id),
        };

        downloaded.ok_or_else(|| TranscriptError::retrieval("yt-dlp did not produce an audio file"))
    }

    fn spawn_error(&self, err: std::io::Error) -> TranscriptError {
        if err.kind() == ErrorKind::NotFound {
            TranscriptError::retrieval(format!(
                "{} is not installed or not on PATH. Please install it: https://github.com/yt-dlp/yt-dlp",
                self.yt_dlp_path
            ))
        } else {
            TranscriptError::retrieval(format!("Failed to run {}: {}", self.yt_dlp_path, err))
        }
    }
}

impl Default for YoutubeExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Look for `<video_id>.<ext>` in `dir`, skipping partial downloads and our own waveform
fn find_downloaded_file(dir: &Path, video_id: &VideoId) -> Option<PathBuf> {
    let prefix = format!("{}.", video_id);
    fs_err::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .find(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.starts_with(&prefix)
                && !name.ends_with(".part")
                && !name.ends_with(".ytdl")
                && !name.ends_with(".wav")
        })
}
