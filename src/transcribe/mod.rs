use std::path::{Path, PathBuf};

use crate::audio::{AudioAcquirer, AudioSource};
use crate::captions::{CaptionOutcome, CaptionSource, YoutubeCaptions};
use crate::cli::Device;
use crate::config::Config;
use crate::extractors::youtube::YoutubeExtractor;
use crate::extractors::VideoId;
use crate::output::Reporter;
use crate::utils::ScratchDir;
use crate::{Result, TranscriptError};

pub mod models;
pub mod processor;

use processor::{SpeechToText, SttOutput, SttRequest, WhisperCli};

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds, never before `start`
    pub end: f64,

    /// Trimmed, non-empty, single-line text
    pub text: String,
}

impl TranscriptSegment {
    /// Build a segment, or `None` when the text is blank.
    ///
    /// Line breaks inside the text are joined with a single space. Negative
    /// start is clamped to zero and an end before the start is clamped to the
    /// start.
    pub fn new(start: f64, end: f64, text: &str) -> Option<Self> {
        let text = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return None;
        }
        let start = start.max(0.0);
        Some(Self {
            start,
            end: end.max(start),
            text,
        })
    }
}

/// Which retrieval path produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    Captions,
    Stt,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Captions => "captions",
            TranscriptSource::Stt => "stt",
        }
    }
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final transcript for one video; read-only once built
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptResult {
    video_id: VideoId,
    source: TranscriptSource,
    language: Option<String>,
    segments: Vec<TranscriptSegment>,
}

impl TranscriptResult {
    pub fn new(
        video_id: VideoId,
        source: TranscriptSource,
        language: Option<String>,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        Self {
            video_id,
            source,
            language,
            segments,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn source(&self) -> TranscriptSource {
        self.source
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// Seconds covered, from zero to the last segment end
    pub fn covered_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.end).fold(0.0, f64::max)
    }
}

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingIdentity,
    TryingCaptions,
    FallingBackToStt,
    DownloadingAudio,
    PreprocessingAudio,
    Transcribing,
    Done(TranscriptSource),
    Failed,
}

impl Stage {
    /// Stage after a successful resolution
    pub fn after_resolution(force_stt: bool) -> Stage {
        if force_stt {
            Stage::FallingBackToStt
        } else {
            Stage::TryingCaptions
        }
    }

    /// Stage after the caption source answered
    pub fn after_captions(outcome: &CaptionOutcome) -> Stage {
        match outcome {
            CaptionOutcome::Found { .. } => Stage::Done(TranscriptSource::Captions),
            CaptionOutcome::Unavailable(_) => Stage::FallingBackToStt,
        }
    }

    /// Next stage of the STT branch once the current one succeeded
    pub fn after_stt_step(self) -> Stage {
        match self {
            Stage::FallingBackToStt => Stage::DownloadingAudio,
            Stage::DownloadingAudio => Stage::PreprocessingAudio,
            Stage::PreprocessingAudio => Stage::Transcribing,
            Stage::Transcribing => Stage::Done(TranscriptSource::Stt),
            other => other,
        }
    }
}

/// Fold a caption-source answer into an outcome.
///
/// A `Retrieval` error means "no captions" and becomes `Unavailable`; every
/// other error stays an error and ends the run.
pub fn classify_captions(answer: Result<CaptionOutcome>) -> Result<CaptionOutcome> {
    match answer {
        Err(TranscriptError::Retrieval(reason)) => Ok(CaptionOutcome::Unavailable(reason)),
        other => other,
    }
}

/// Per-run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Preferred caption language, also the STT language hint
    pub language: String,
    pub model: String,
    pub device: Device,
    pub force_stt: bool,
    pub keep_temp: bool,
    /// Root for the scratch directory (system temp dir when `None`)
    pub temp_root: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            model: "distil-large-v3".to_string(),
            device: Device::Auto,
            force_stt: false,
            keep_temp: false,
            temp_root: None,
        }
    }
}

impl PipelineOptions {
    /// Language forced on the STT engine; blank or `auto` means detect
    fn language_hint(&self) -> Option<String> {
        let language = self.language.trim();
        (!language.is_empty() && !language.eq_ignore_ascii_case("auto"))
            .then(|| language.to_string())
    }
}

/// Captions first, speech-to-text fallback
pub struct TranscriptionPipeline {
    captions: Box<dyn CaptionSource>,
    audio: Box<dyn AudioSource>,
    stt: Box<dyn SpeechToText>,
    options: PipelineOptions,
    reporter: Reporter,
}

impl TranscriptionPipeline {
    pub fn new(
        captions: Box<dyn CaptionSource>,
        audio: Box<dyn AudioSource>,
        stt: Box<dyn SpeechToText>,
        options: PipelineOptions,
        reporter: Reporter,
    ) -> Self {
        Self {
            captions,
            audio,
            stt,
            options,
            reporter,
        }
    }

    /// Wire the yt-dlp, ffmpeg and whisper.cpp adapters from configuration
    pub fn from_config(config: &Config, mut options: PipelineOptions, reporter: Reporter) -> Self {
        let youtube = YoutubeExtractor::new(config.tools.yt_dlp.clone());
        if options.temp_root.is_none() {
            options.temp_root = config.app.temp_dir.clone();
        }
        Self::new(
            Box::new(YoutubeCaptions::new(youtube.clone())),
            Box::new(AudioAcquirer::new(youtube, config.tools.ffmpeg.clone())),
            Box::new(WhisperCli::from_config(config)),
            options,
            reporter,
        )
    }

    /// Resolve the input URL; failures are terminal `InvalidInput`
    pub fn resolve(&self, url: &str) -> Result<VideoId> {
        tracing::info!(stage = ?Stage::ResolvingIdentity, "Resolving {}", url);
        VideoId::resolve(url)
    }

    /// Run the fallback pipeline for an already resolved video
    pub async fn transcribe(&self, video_id: &VideoId) -> Result<TranscriptResult> {
        let stage = Stage::after_resolution(self.options.force_stt);
        tracing::info!(stage = ?stage, video_id = %video_id);

        if stage == Stage::TryingCaptions {
            self.reporter.step("Trying captions...");
            let answer = self.captions.fetch(video_id, &self.options.language).await;
            let outcome = classify_captions(answer).inspect_err(|e| {
                tracing::info!(stage = ?Stage::Failed, "Caption lookup failed: {}", e);
            })?;

            match Stage::after_captions(&outcome) {
                Stage::Done(source) => {
                    if let CaptionOutcome::Found { segments, language } = outcome {
                        tracing::info!(stage = ?Stage::Done(source));
                        return Ok(TranscriptResult::new(
                            video_id.clone(),
                            source,
                            Some(language),
                            segments,
                        ));
                    }
                }
                _ => {
                    if let CaptionOutcome::Unavailable(reason) = &outcome {
                        tracing::info!(stage = ?Stage::FallingBackToStt, "Captions unavailable: {}", reason);
                        self.reporter.warn(&format!(
                            "Captions unavailable: {}. Falling back to STT.",
                            reason
                        ));
                    }
                }
            }
        }

        self.transcribe_with_stt(video_id).await
    }

    /// STT branch; the scratch directory is released on every exit path
    async fn transcribe_with_stt(&self, video_id: &VideoId) -> Result<TranscriptResult> {
        let scratch = ScratchDir::create(
            self.options.temp_root.as_deref(),
            video_id,
            self.options.keep_temp,
        )?;

        let outcome = self.run_stt_stages(video_id, scratch.path()).await;
        if let Err(e) = &outcome {
            tracing::info!(stage = ?Stage::Failed, "Speech-to-text failed: {}", e);
        }
        if scratch.is_kept() {
            self.reporter
                .note(&format!("Temporary files kept at: {}", scratch.path().display()));
        }
        drop(scratch);

        let output = outcome?;
        let language = output.language.or_else(|| self.options.language_hint());
        tracing::info!(stage = ?Stage::Done(TranscriptSource::Stt));
        Ok(TranscriptResult::new(
            video_id.clone(),
            TranscriptSource::Stt,
            language,
            output.segments,
        ))
    }

    async fn run_stt_stages(&self, video_id: &VideoId, scratch: &Path) -> Result<SttOutput> {
        let mut stage = Stage::FallingBackToStt.after_stt_step();

        tracing::info!(stage = ?stage);
        self.reporter.step("Downloading audio...");
        let spinner = self.reporter.spinner("Downloading audio with yt-dlp...");
        let downloaded = self
            .audio
            .download(&video_id.canonical_url(), video_id, scratch)
            .await;
        spinner.finish_and_clear();
        let downloaded = downloaded?;
        stage = stage.after_stt_step();

        tracing::info!(stage = ?stage);
        self.reporter.step("Preprocessing audio...");
        let waveform = self
            .audio
            .convert_to_waveform(&downloaded, scratch, video_id)
            .await?;
        stage = stage.after_stt_step();

        tracing::info!(stage = ?stage);
        self.reporter.step("Transcribing audio...");
        let request = SttRequest {
            model: self.options.model.clone(),
            device: self.options.device,
            language: self.options.language_hint(),
        };
        self.stt.prepare(&request).await?;
        let spinner = self
            .reporter
            .spinner(&format!("Transcribing with whisper ({})...", request.model));
        let output = self.stt.transcribe(&waveform, &request).await;
        spinner.finish_and_clear();
        output
    }
}
