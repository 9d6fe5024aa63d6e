use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::transcribe::TranscriptResult;
use crate::{Result, TranscriptError};

pub mod formatters;
pub mod progress;

pub use formatters::*;
pub use progress::Reporter;

/// Render a result in the requested format
pub fn render(result: &TranscriptResult, format: OutputFormat, include_timestamps: bool) -> String {
    match format {
        OutputFormat::Txt => format_as_text(result, include_timestamps),
        OutputFormat::Srt => format_as_srt(result),
        OutputFormat::Json => format_as_json(result, include_timestamps),
    }
}

/// Create the output directory (and parents) if needed
pub fn ensure_out_dir(out_dir: &Path) -> Result<()> {
    fs_err::create_dir_all(out_dir).map_err(|e| {
        TranscriptError::output_write(format!(
            "Unable to create output directory '{}': {}",
            out_dir.display(),
            e
        ))
    })
}

/// `<out_dir>/<video_id>.<ext>`
pub fn build_output_path(out_dir: &Path, video_id: &str, format: OutputFormat) -> PathBuf {
    out_dir.join(format!("{}.{}", video_id, format.extension()))
}

/// Render and write the result, returning the written path
pub fn save_to_file(
    result: &TranscriptResult,
    out_dir: &Path,
    format: OutputFormat,
    include_timestamps: bool,
) -> Result<PathBuf> {
    let content = render(result, format, include_timestamps);
    let path = build_output_path(out_dir, result.video_id().as_str(), format);

    fs_err::write(&path, content).map_err(|e| {
        TranscriptError::output_write(format!(
            "Unable to write transcript file '{}': {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}
