//! yt-transcript - fetch a transcript for a YouTube video
//!
//! Manually authored captions are preferred. When a video has none, the audio is
//! downloaded, converted to a 16kHz mono waveform and transcribed locally with
//! whisper.cpp. Both paths produce the same [`TranscriptResult`], which the
//! [`output`] module renders as plain text, SRT or JSON.

pub mod audio;
pub mod captions;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Device, OutputFormat};
pub use config::Config;
pub use extractors::VideoId;
pub use transcribe::{
    TranscriptResult, TranscriptSegment, TranscriptSource, TranscriptionPipeline,
};

/// Result type used throughout the library
pub type Result<T, E = TranscriptError> = std::result::Result<T, E>;

/// Error kinds surfaced by the transcript pipeline.
///
/// Every adapter maps its underlying failure into one of these; the CLI turns
/// them into distinct exit codes.
#[derive(thiserror::Error, Debug)]
pub enum TranscriptError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Retrieval(String),

    #[error("{0}")]
    Transcription(String),

    #[error("{0}")]
    OutputWrite(String),
}

impl TranscriptError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::Transcription(msg.into())
    }

    pub fn output_write(msg: impl Into<String>) -> Self {
        Self::OutputWrite(msg.into())
    }

    /// Process exit code associated with this kind of failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => 1,
            Self::Retrieval(_) => 2,
            Self::Transcription(_) => 3,
            Self::OutputWrite(_) => 4,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg)
            | Self::Retrieval(msg)
            | Self::Transcription(msg)
            | Self::OutputWrite(msg) => msg,
        }
    }

    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        assert_eq!(TranscriptError::invalid_input("x").exit_code(), 1);
        assert_eq!(TranscriptError::retrieval("x").exit_code(), 2);
        assert_eq!(TranscriptError::transcription("x").exit_code(), 3);
        assert_eq!(TranscriptError::output_write("x").exit_code(), 4);
    }

    #[test]
    fn test_display_is_the_message() {
        let err = TranscriptError::retrieval("Failed to download audio: 403");
        assert_eq!(err.to_string(), "Failed to download audio: 403");
        assert_eq!(err.message(), "Failed to download audio: 403");
        assert!(err.is_retrieval());
    }
}
