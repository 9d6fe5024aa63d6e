use std::fmt;
use url::Url;

pub mod youtube;

use crate::{Result, TranscriptError};

/// Host names accepted as YouTube video links (compared lowercase)
pub const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
    "www.youtu.be",
];

const VIDEO_ID_LEN: usize = 11;

/// Canonical 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Resolve a user-supplied URL into a video identity.
    ///
    /// Short links use the first path segment, `/shorts/<id>` links the segment
    /// after `shorts`, and everything else the `v` query parameter. No network
    /// access happens here.
    pub fn resolve(url: &str) -> Result<Self> {
        let parsed = validate_url(url)?;

        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        if !YOUTUBE_HOSTS.contains(&host.as_str()) {
            return Err(TranscriptError::invalid_input(
                "Only YouTube video URLs are supported",
            ));
        }

        let candidate = if host.ends_with("youtu.be") {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next())
                .map(str::to_string)
        } else if parsed.path().starts_with("/shorts/") {
            parsed
                .path_segments()
                .and_then(|segments| segments.skip_while(|s| *s != "shorts").nth(1))
                .map(str::to_string)
        } else {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
        };

        match candidate {
            Some(id) if Self::is_valid(&id) => Ok(Self(id)),
            _ => Err(TranscriptError::invalid_input(
                "Could not extract a valid YouTube video ID from URL",
            )),
        }
    }

    /// Exactly 11 characters, each ASCII alphanumeric, `-` or `_`
    pub fn is_valid(candidate: &str) -> bool {
        candidate.len() == VIDEO_ID_LEN
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Long-form watch URL used by every downstream stage
    pub fn canonical_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a URL and require an HTTP(S) scheme
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| TranscriptError::invalid_input("URL must start with http:// or https://"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TranscriptError::invalid_input(
            "URL must start with http:// or https://",
        ));
    }

    Ok(parsed)
}
