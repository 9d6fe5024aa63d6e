use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External executables
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp executable, used for caption listing and audio download
    pub yt_dlp: String,

    /// ffmpeg executable
    pub ffmpeg: String,

    /// whisper.cpp command line executable
    pub whisper: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root for scratch directories (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    /// Where ggml whisper models live
    pub models_dir: Option<PathBuf>,

    /// Download missing whisper models from Hugging Face
    pub download_models: bool,

    /// Silero VAD model (file name inside `models_dir`, or a path)
    pub vad_model: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            whisper: "whisper-cli".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            models_dir: None,
            download_models: true,
            vad_model: Some("ggml-silero-v5.1.2.bin".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, or the default locations.
    ///
    /// A missing default file yields the built-in defaults; a missing explicit
    /// file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().filter(|path| path.exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        tracing::debug!("Loading config from {}", config_path.display());
        let content =
            fs_err::read_to_string(&config_path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Get configuration file path
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("yt-transcript").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tools.yt_dlp", &self.tools.yt_dlp),
            ("tools.ffmpeg", &self.tools.ffmpeg),
            ("tools.whisper", &self.tools.whisper),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }
        Ok(())
    }

    /// Directory holding whisper models
    pub fn models_dir(&self) -> PathBuf {
        self.app.models_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("yt-transcript")
                .join("models")
        })
    }
}
