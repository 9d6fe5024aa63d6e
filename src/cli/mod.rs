use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "yt-transcript",
    about = "Fetch a transcript from a YouTube URL (captions first, local STT fallback)",
    version,
    long_about = "Fetches the manually authored captions of a YouTube video. When none exist, downloads the audio, converts it with ffmpeg and transcribes it locally with whisper.cpp."
)]
pub struct Cli {
    /// YouTube video URL (watch, youtu.be or /shorts/ links)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Directory to write transcript output
    #[arg(long, value_name = "DIR", default_value = "outputs")]
    pub out_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "txt")]
    pub format: OutputFormat,

    /// Include timestamps in txt/json outputs (srt always includes them)
    #[arg(long)]
    pub timestamps: bool,

    /// Preferred language code (e.g. en)
    #[arg(short, long, value_name = "LANG", default_value = "en")]
    pub language: String,

    /// Whisper model name (tiny, base, small, medium, large-v3, distil-large-v3, ...) or path to a ggml model file
    #[arg(
        short,
        long,
        value_name = "MODEL",
        default_value = "distil-large-v3",
        env = "YT_TRANSCRIPT_MODEL"
    )]
    pub model: String,

    /// Inference device for the STT fallback
    #[arg(long, value_enum, default_value = "auto", env = "YT_TRANSCRIPT_DEVICE")]
    pub device: Device,

    /// Skip captions and always run the STT fallback
    #[arg(long)]
    pub force_stt: bool,

    /// Print progress lines
    #[arg(short, long)]
    pub verbose: bool,

    /// Keep temporary audio files
    #[arg(long)]
    pub keep_temp: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, one line per segment
    Txt,
    /// SRT subtitle format
    Srt,
    /// JSON document
    Json,
}

impl OutputFormat {
    /// File extension used for the output file
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Srt => "srt",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Device {
    /// Let the engine pick
    #[default]
    Auto,
    /// Force CPU inference
    Cpu,
    /// Use the first CUDA GPU
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["yt-transcript", "https://youtu.be/dQw4w9WgXcQ"]).unwrap();
        assert_eq!(cli.out_dir, PathBuf::from("outputs"));
        assert_eq!(cli.format, OutputFormat::Txt);
        assert_eq!(cli.language, "en");
        assert_eq!(cli.device, Device::Auto);
        assert!(!cli.timestamps && !cli.force_stt && !cli.verbose && !cli.keep_temp);
    }

    #[test]
    fn test_all_options() {
        let cli = Cli::try_parse_from([
            "yt-transcript",
            "https://youtu.be/dQw4w9WgXcQ",
            "--out-dir",
            "/tmp/out",
            "--format",
            "json",
            "--timestamps",
            "--language",
            "de",
            "--model",
            "small",
            "--device",
            "cpu",
            "--force-stt",
            "--verbose",
            "--keep-temp",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.model, "small");
        assert_eq!(cli.device, Device::Cpu);
        assert!(cli.timestamps && cli.force_stt && cli.verbose && cli.keep_temp);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let parsed = Cli::try_parse_from([
            "yt-transcript",
            "https://youtu.be/dQw4w9WgXcQ",
            "--format",
            "vtt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_extension_matches_format_name() {
        for format in [OutputFormat::Txt, OutputFormat::Srt, OutputFormat::Json] {
            assert_eq!(format.to_string(), format.extension());
        }
    }
}
