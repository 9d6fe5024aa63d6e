//! Whisper ggml model lookup and download.

use futures_util::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Result, TranscriptError};

/// Known models: (name, Hugging Face repo, file name)
pub const KNOWN_MODELS: &[(&str, &str, &str)] = &[
    ("tiny", "ggerganov/whisper.cpp", "ggml-tiny.bin"),
    ("tiny.en", "ggerganov/whisper.cpp", "ggml-tiny.en.bin"),
    ("base", "ggerganov/whisper.cpp", "ggml-base.bin"),
    ("base.en", "ggerganov/whisper.cpp", "ggml-base.en.bin"),
    ("small", "ggerganov/whisper.cpp", "ggml-small.bin"),
    ("small.en", "ggerganov/whisper.cpp", "ggml-small.en.bin"),
    ("medium", "ggerganov/whisper.cpp", "ggml-medium.bin"),
    ("medium.en", "ggerganov/whisper.cpp", "ggml-medium.en.bin"),
    ("large-v2", "ggerganov/whisper.cpp", "ggml-large-v2.bin"),
    ("large-v3", "ggerganov/whisper.cpp", "ggml-large-v3.bin"),
    ("large-v3-turbo", "ggerganov/whisper.cpp", "ggml-large-v3-turbo.bin"),
    ("distil-large-v3", "distil-whisper/distil-large-v3-ggml", "ggml-distil-large-v3.bin"),
];

/// Silero voice-activity model used by whisper.cpp's `--vad`
pub const VAD_MODEL: (&str, &str) = ("ggml-org/whisper-vad", "ggml-silero-v5.1.2.bin");

/// Where a requested model lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    /// Explicit file given by the user
    File(PathBuf),
    /// Known model inside the models directory, downloadable from `url`
    Managed { path: PathBuf, url: String },
}

impl ModelLocation {
    pub fn path(&self) -> &Path {
        match self {
            ModelLocation::File(path) | ModelLocation::Managed { path, .. } => path,
        }
    }
}

fn hf_url(repo: &str, file: &str) -> String {
    format!("https://huggingface.co/{}/resolve/main/{}", repo, file)
}

/// Map a model name (or path) to its location
pub fn resolve_model(models_dir: &Path, name: &str) -> Result<ModelLocation> {
    let name = name.trim();
    if name.contains('/') || name.contains('\\') || name.ends_with(".bin") {
        return Ok(ModelLocation::File(PathBuf::from(name)));
    }

    KNOWN_MODELS
        .iter()
        .find(|(model, _, _)| *model == name)
        .map(|(_, repo, file)| ModelLocation::Managed {
            path: models_dir.join(file),
            url: hf_url(repo, file),
        })
        .ok_or_else(|| {
            let known: Vec<&str> = KNOWN_MODELS.iter().map(|(model, _, _)| *model).collect();
            TranscriptError::transcription(format!(
                "Unable to load whisper model '{}': unknown model name (known: {})",
                name,
                known.join(", ")
            ))
        })
}

/// Location of the VAD model; `name` is a file inside `models_dir` or a path
pub fn resolve_vad_model(models_dir: &Path, name: &str) -> ModelLocation {
    if name.contains('/') || name.contains('\\') {
        return ModelLocation::File(PathBuf::from(name));
    }
    let (repo, _) = VAD_MODEL;
    ModelLocation::Managed {
        path: models_dir.join(name),
        url: hf_url(repo, name),
    }
}

/// Make sure the model file exists locally, downloading it when allowed
pub async fn ensure_model(name: &str, location: &ModelLocation, allow_download: bool) -> Result<PathBuf> {
    let path = location.path();
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    match location {
        ModelLocation::File(_) => Err(TranscriptError::transcription(format!(
            "Unable to load whisper model '{}': file not found",
            name
        ))),
        ModelLocation::Managed { .. } if !allow_download => {
            Err(TranscriptError::transcription(format!(
                "Unable to load whisper model '{}': {} not found and model downloads are disabled",
                name,
                path.display()
            )))
        }
        ModelLocation::Managed { url, .. } => {
            download_model(url, path).await.map_err(|e| {
                TranscriptError::transcription(format!(
                    "Unable to load whisper model '{}': {}",
                    name, e
                ))
            })?;
            Ok(path.to_path_buf())
        }
    }
}

/// Stream `url` into `path` with a progress bar; written to `<path>.part` first
async fn download_model(url: &str, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }

    tracing::info!("Downloading model from {} to {}", url, path.display());
    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        anyhow::bail!("download failed: HTTP {}", response.status());
    }

    let total_size = response.content_length().unwrap_or(0);
    let progress = ProgressBar::new(total_size);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    progress.set_message(format!("Downloading {}", file_name));

    let partial = path.with_extension("bin.part");
    match stream_to_file(response.bytes_stream(), &partial, path, &progress).await {
        Ok(()) => {
            progress.finish_with_message("Download complete");
            Ok(())
        }
        Err(e) => {
            progress.abandon_with_message("Download failed");
            Err(e)
        }
    }
}

/// Write every chunk to `partial`, then move it to `path`.
///
/// The partial file is removed on any failure.
async fn stream_to_file<S, T, E>(
    stream: S,
    partial: &Path,
    path: &Path,
    progress: &ProgressBar,
) -> anyhow::Result<()>
where
    S: Stream<Item = std::result::Result<T, E>>,
    T: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let written = write_chunks(stream, partial, progress)
        .await
        .and_then(|()| fs_err::rename(partial, path).map_err(anyhow::Error::from));

    if written.is_err() && partial.exists() {
        if let Err(e) = fs_err::remove_file(partial) {
            tracing::warn!("Failed to remove partial download: {}", e);
        }
    }
    written
}

async fn write_chunks<S, T, E>(stream: S, partial: &Path, progress: &ProgressBar) -> anyhow::Result<()>
where
    S: Stream<Item = std::result::Result<T, E>>,
    T: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = fs_err::File::create(partial)?;
    let mut downloaded = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let bytes = chunk.as_ref();
        file.write_all(bytes)?;
        downloaded += bytes.len() as u64;
        progress.set_position(downloaded);
    }
    file.flush()?;
    Ok(())
}
