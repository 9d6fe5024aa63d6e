use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::models::{self, ModelLocation};
use super::TranscriptSegment;
use crate::cli::Device;
use crate::config::Config;
use crate::utils::failure_detail;
use crate::{Result, TranscriptError};

/// What to run the speech-to-text engine with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttRequest {
    /// Model name or path to a ggml file
    pub model: String,
    pub device: Device,
    /// Language to force; `None` lets the engine detect it
    pub language: Option<String>,
}

/// Normalized engine output
#[derive(Debug, Clone, PartialEq)]
pub struct SttOutput {
    pub segments: Vec<TranscriptSegment>,
    /// Language declared or detected by the engine
    pub language: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Make the model for `request` available locally, downloading it if needed
    async fn prepare(&self, request: &SttRequest) -> Result<()>;

    /// Transcribe a 16kHz mono waveform. Every failure is a `Transcription` error.
    async fn transcribe(&self, waveform: &Path, request: &SttRequest) -> Result<SttOutput>;
}

/// whisper.cpp `-oj` output document
#[derive(Debug, Deserialize)]
struct WhisperJson {
    params: Option<WhisperParams>,
    result: Option<WhisperResultInfo>,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperParams {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperResultInfo {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    #[serde(default)]
    text: String,
}

/// Milliseconds from the start of the audio
#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: i64,
    to: i64,
}

/// Parse whisper.cpp JSON output into segments plus language.
///
/// Timestamps are clamped to non-negative, text trimmed, empty segments
/// dropped. Zero remaining segments is an error.
pub fn parse_whisper_json(body: &str) -> Result<SttOutput> {
    let doc: WhisperJson = serde_json::from_str(body).map_err(|e| {
        TranscriptError::transcription(format!("Unable to parse whisper output: {}", e))
    })?;

    let segments: Vec<TranscriptSegment> = doc
        .transcription
        .iter()
        .filter_map(|segment| {
            let start = (segment.offsets.from as f64 / 1000.0).max(0.0);
            let end = (segment.offsets.to as f64 / 1000.0).max(0.0);
            TranscriptSegment::new(start, end, &segment.text)
        })
        .collect();

    if segments.is_empty() {
        return Err(TranscriptError::transcription(
            "whisper returned no transcript segments",
        ));
    }

    let language = doc
        .result
        .and_then(|r| r.language)
        .or_else(|| doc.params.and_then(|p| p.language))
        .filter(|lang| !lang.is_empty() && lang != "auto");

    Ok(SttOutput { segments, language })
}

/// whisper.cpp command line backend
pub struct WhisperCli {
    binary: String,
    models_dir: PathBuf,
    download_models: bool,
    vad_model: Option<String>,
    loaded: Mutex<HashMap<String, PathBuf>>,
    vad_path: OnceCell<Option<PathBuf>>,
}

impl WhisperCli {
    pub fn new(binary: impl Into<String>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            models_dir: models_dir.into(),
            download_models: true,
            vad_model: None,
            loaded: Mutex::new(HashMap::new()),
            vad_path: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.tools.whisper.clone(),
            models_dir: config.models_dir(),
            download_models: config.app.download_models,
            vad_model: config.app.vad_model.clone(),
            loaded: Mutex::new(HashMap::new()),
            vad_path: OnceCell::new(),
        }
    }

    pub fn with_downloads(mut self, enabled: bool) -> Self {
        self.download_models = enabled;
        self
    }

    pub fn with_vad_model(mut self, vad_model: Option<String>) -> Self {
        self.vad_model = vad_model;
        self
    }

    fn cached_model(&self, name: &str) -> Option<PathBuf> {
        self.loaded.lock().ok()?.get(name).cloned()
    }

    /// Locate (and fetch if needed) the model; failures mean it cannot be loaded
    async fn load_model(&self, name: &str) -> Result<PathBuf> {
        if let Some(path) = self.cached_model(name) {
            return Ok(path);
        }
        let location = models::resolve_model(&self.models_dir, name)?;
        let path = models::ensure_model(name, &location, self.download_models).await?;
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(name.to_string(), path.clone());
        }
        Ok(path)
    }

    /// VAD model path, or `None` when voice-activity filtering is unavailable.
    /// Resolved once per backend.
    async fn load_vad_model(&self) -> Option<PathBuf> {
        self.vad_path
            .get_or_init(|| async {
                let Some(name) = self.vad_model.as_deref() else {
                    return None;
                };
                let location = models::resolve_vad_model(&self.models_dir, name);
                let allow_download =
                    self.download_models && matches!(location, ModelLocation::Managed { .. });
                match models::ensure_model(name, &location, allow_download).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!("Voice activity filter disabled: {}", e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Command line for one run; output goes to `<output_base>.json`
    pub fn build_args(
        model: &Path,
        waveform: &Path,
        output_base: &Path,
        request: &SttRequest,
        vad_model: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            model.to_string_lossy().into_owned(),
            "-f".to_string(),
            waveform.to_string_lossy().into_owned(),
            "-oj".to_string(),
            "-of".to_string(),
            output_base.to_string_lossy().into_owned(),
            "-np".to_string(),
            "-l".to_string(),
            request.language.clone().unwrap_or_else(|| "auto".to_string()),
        ];

        match request.device {
            Device::Auto => {}
            Device::Cpu => args.push("-ng".to_string()),
            Device::Cuda => args.extend(["-dev".to_string(), "0".to_string()]),
        }

        if let Some(vad) = vad_model {
            args.extend([
                "--vad".to_string(),
                "-vm".to_string(),
                vad.to_string_lossy().into_owned(),
            ]);
        }

        args
    }
}

#[async_trait]
impl SpeechToText for WhisperCli {
    async fn prepare(&self, request: &SttRequest) -> Result<()> {
        self.load_model(&request.model).await?;
        self.load_vad_model().await;
        Ok(())
    }

    async fn transcribe(&self, waveform: &Path, request: &SttRequest) -> Result<SttOutput> {
        let model = self.load_model(&request.model).await?;
        let vad_model = self.load_vad_model().await;

        let output_base = waveform.with_extension("");
        let json_path = output_base.with_extension("json");
        let args = Self::build_args(&model, waveform, &output_base, request, vad_model.as_deref());

        tracing::debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TranscriptError::transcription(format!(
                        "{} is not installed or not on PATH",
                        self.binary
                    ))
                } else {
                    TranscriptError::transcription(format!("Failed to run {}: {}", self.binary, e))
                }
            })?;

        if !output.status.success() {
            let detail = failure_detail(&output.stderr, &output.stdout, "Unknown whisper error");
            return Err(TranscriptError::transcription(format!(
                "Transcription failed: {}",
                detail
            )));
        }

        let body = fs_err::read_to_string(&json_path).map_err(|e| {
            TranscriptError::transcription(format!("whisper produced no output file: {}", e))
        })?;

        let result = parse_whisper_json(&body)?;
        tracing::info!(
            "Transcribed {} segments (language: {})",
            result.segments.len(),
            result.language.as_deref().unwrap_or("unknown")
        );
        Ok(result)
    }
}
