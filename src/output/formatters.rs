//! Pure renderers for a finished transcript.

use serde::Serialize;

use crate::transcribe::{TranscriptResult, TranscriptSegment};

/// Plain text, one line per segment, optionally prefixed with `[MM:SS]`
pub fn format_as_text(result: &TranscriptResult, include_timestamps: bool) -> String {
    let lines: Vec<String> = result
        .segments()
        .iter()
        .map(|segment| {
            if include_timestamps {
                format!("[{}] {}", format_timestamp_short(segment.start), segment.text)
            } else {
                segment.text.clone()
            }
        })
        .collect();
    format!("{}\n", lines.join("\n").trim())
}

/// SubRip cues, numbered from 1
pub fn format_as_srt(result: &TranscriptResult) -> String {
    let cues: Vec<String> = result
        .segments()
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                index + 1,
                format_timestamp_srt(segment.start),
                format_timestamp_srt(segment.end),
                segment.text
            )
        })
        .collect();
    format!("{}\n", cues.join("\n").trim())
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    video_id: &'a str,
    source: &'a str,
    language: Option<&'a str>,
    segments: Vec<JsonSegment<'a>>,
}

#[derive(Serialize)]
struct JsonSegment<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<f64>,
}

impl<'a> JsonSegment<'a> {
    fn new(segment: &'a TranscriptSegment, include_timestamps: bool) -> Self {
        let (start, end) = if include_timestamps {
            (Some(round_millis(segment.start)), Some(round_millis(segment.end)))
        } else {
            (None, None)
        };
        Self {
            text: &segment.text,
            start,
            end,
        }
    }
}

/// Two-space indented JSON, non-ASCII escaped, trailing newline
pub fn format_as_json(result: &TranscriptResult, include_timestamps: bool) -> String {
    let doc = JsonTranscript {
        video_id: result.video_id().as_str(),
        source: result.source().as_str(),
        language: result.language(),
        segments: result
            .segments()
            .iter()
            .map(|segment| JsonSegment::new(segment, include_timestamps))
            .collect(),
    };
    // Plain strings, numbers and options cannot fail to serialize
    let pretty = serde_json::to_string_pretty(&doc).unwrap_or_default();
    format!("{}\n", escape_non_ascii(&pretty))
}

/// Replace every non-ASCII char with `\uXXXX` escapes (surrogate pairs above the BMP).
///
/// Only valid inside JSON string literals, which is the only place non-ASCII
/// text can appear in serde_json output.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// `MM:SS`, or `HH:MM:SS` when the hour is non-zero; seconds truncated
pub fn format_timestamp_short(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// `HH:MM:SS,mmm`
pub fn format_timestamp_srt(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
