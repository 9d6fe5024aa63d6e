//! Manually authored YouTube captions.
//!
//! yt-dlp lists the tracks; only the `subtitles` section (uploaded by the
//! owner) is consulted, never `automatic_captions`. The chosen track is fetched
//! in YouTube's json3 timed-text format and normalized into segments.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

use crate::extractors::youtube::{VideoInfo, YoutubeExtractor};
use crate::extractors::VideoId;
use crate::transcribe::TranscriptSegment;
use crate::Result;

/// What the caption source found for a video.
///
/// `Unavailable` is the expected "no usable captions" outcome and sends the
/// pipeline to the speech-to-text fallback. Errors returned alongside it
/// (`Err`) are not fallback triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionOutcome {
    Found {
        segments: Vec<TranscriptSegment>,
        language: String,
    },
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn fetch(&self, video_id: &VideoId, preferred_language: &str) -> Result<CaptionOutcome>;
}

/// Language lists tried in order; the first one with a manual track wins
pub fn language_candidates(preferred: &str) -> Vec<Vec<String>> {
    vec![
        vec![preferred.to_string()],
        vec![preferred.to_string(), "en".to_string()],
        vec!["en".to_string()],
    ]
}

/// One raw caption line as delivered by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSnippet {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

/// Turn raw snippets into segments: `end = start + max(duration, 0)`, text
/// trimmed, empty lines dropped.
pub fn normalize_snippets(snippets: impl IntoIterator<Item = CaptionSnippet>) -> Vec<TranscriptSegment> {
    snippets
        .into_iter()
        .filter_map(|snippet| {
            let end = snippet.start + snippet.duration.max(0.0);
            TranscriptSegment::new(snippet.start, end, &snippet.text)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(rename = "tStartMs", default)]
    start_ms: f64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: f64,
    segs: Option<Vec<TimedTextSeg>>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

/// Parse a json3 timed-text document into snippets.
///
/// Events without text runs (window/style events) are skipped.
pub fn parse_json3(body: &str) -> std::result::Result<Vec<CaptionSnippet>, serde_json::Error> {
    let doc: TimedText = serde_json::from_str(body)?;
    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            Some(CaptionSnippet {
                start: event.start_ms / 1000.0,
                duration: event.duration_ms / 1000.0,
                text: segs.into_iter().map(|seg| seg.utf8).collect(),
            })
        })
        .collect())
}

/// Caption source backed by yt-dlp metadata and the timed-text endpoint
pub struct YoutubeCaptions {
    youtube: YoutubeExtractor,
    client: Client,
}

impl YoutubeCaptions {
    pub fn new(youtube: YoutubeExtractor) -> Self {
        Self {
            youtube,
            client: Client::new(),
        }
    }

    /// Fetch and parse one track's json3 rendition
    async fn fetch_track(
        &self,
        info: &VideoInfo,
        language: &str,
    ) -> std::result::Result<Vec<CaptionSnippet>, String> {
        let url = info
            .manual_track(language)
            .and_then(|formats| {
                formats
                    .iter()
                    .find(|format| format.ext.as_deref() == Some("json3"))
            })
            .and_then(|format| format.url.as_deref())
            .ok_or_else(|| format!("track '{}' has no json3 rendition", language))?;

        tracing::debug!("Fetching '{}' captions from {}", language, url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request for '{}' captions failed: {}", language, e))?;

        if !response.status().is_success() {
            return Err(format!(
                "request for '{}' captions failed: HTTP {}",
                language,
                response.status()
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("reading '{}' captions failed: {}", language, e))?;

        parse_json3(&body).map_err(|e| format!("'{}' captions are not valid json3: {}", language, e))
    }

    /// Walk the language candidates over an existing track listing.
    ///
    /// Each track is requested at most once: a language whose fetch failed is
    /// skipped by later candidates.
    pub async fn fetch_from_listing(
        &self,
        video_id: &VideoId,
        info: &VideoInfo,
        preferred_language: &str,
    ) -> CaptionOutcome {
        let candidates = language_candidates(preferred_language);
        let mut failed: HashSet<String> = HashSet::new();
        let mut last_error = String::from("no candidates");

        for languages in &candidates {
            let Some(language) = pick_manual_track(info, languages, &failed) else {
                if !languages.iter().all(|lang| failed.contains(lang)) {
                    last_error = format!("no manually created transcript for {:?}", languages);
                }
                continue;
            };

            match self.fetch_track(info, language).await {
                Ok(snippets) => {
                    let segments = normalize_snippets(snippets);
                    if segments.is_empty() {
                        return CaptionOutcome::Unavailable(
                            "Captions were found but no usable text segments were returned"
                                .to_string(),
                        );
                    }
                    tracing::info!("Using '{}' captions ({} segments)", language, segments.len());
                    return CaptionOutcome::Found {
                        segments,
                        language: language.to_string(),
                    };
                }
                Err(e) => {
                    tracing::debug!("{}", e);
                    failed.insert(language.to_string());
                    last_error = e;
                }
            }
        }

        CaptionOutcome::Unavailable(format!(
            "No manually created captions available for video '{}' in languages {:?}: {}",
            video_id, candidates, last_error
        ))
    }
}

/// First language of `languages` with a manual track that has not failed yet
pub fn pick_manual_track<'a>(
    info: &VideoInfo,
    languages: &'a [String],
    failed: &HashSet<String>,
) -> Option<&'a str> {
    languages
        .iter()
        .find(|lang| !failed.contains(*lang) && info.manual_track(lang).is_some())
        .map(String::as_str)
}

#[async_trait]
impl CaptionSource for YoutubeCaptions {
    async fn fetch(&self, video_id: &VideoId, preferred_language: &str) -> Result<CaptionOutcome> {
        let info = match self.youtube.get_video_info(&video_id.canonical_url()).await {
            Ok(info) => info,
            Err(e) => {
                return Ok(CaptionOutcome::Unavailable(format!(
                    "Unable to list captions for video '{}': {}",
                    video_id, e
                )))
            }
        };
        tracing::debug!("Manual caption tracks: {:?}", info.manual_languages());

        Ok(self.fetch_from_listing(video_id, &info, preferred_language).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn snippet(start: f64, duration: f64, text: &str) -> CaptionSnippet {
        CaptionSnippet {
            start,
            duration,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_language_candidates_order() {
        assert_eq!(
            language_candidates("de"),
            vec![vec!["de"], vec!["de", "en"], vec!["en"]]
        );
        // the duplicate for "en" is harmless
        assert_eq!(
            language_candidates("en"),
            vec![vec!["en"], vec!["en", "en"], vec!["en"]]
        );
    }

    #[test]
    fn test_normalize_trims_and_drops_empty() {
        let segments = normalize_snippets(vec![
            snippet(0.2, 1.9, "  Hello world \n"),
            snippet(2.1, 0.5, "   "),
            snippet(62.2, 2.7, "Second line"),
        ]);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert!((segments[0].end - 2.1).abs() < 1e-9);
        assert_eq!(segments[1].text, "Second line");
    }

    #[test]
    fn test_negative_or_zero_duration_clamps_end_to_start() {
        let segments = normalize_snippets(vec![snippet(5.0, -3.0, "a"), snippet(7.0, 0.0, "b")]);
        assert_eq!(segments[0].start, 5.0);
        assert_eq!(segments[0].end, 5.0);
        assert_eq!(segments[1].end, 7.0);
    }

    #[test]
    fn test_all_empty_yields_nothing() {
        assert!(normalize_snippets(vec![snippet(0.0, 1.0, ""), snippet(1.0, 1.0, " \n")]).is_empty());
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 213000, "id": 1, "wpWinPosId": 1, "wsWinStyleId": 1},
                {"tStartMs": 200, "dDurationMs": 1900, "segs": [{"utf8": "Hello "}, {"utf8": "world"}]},
                {"tStartMs": 2100, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 62200, "dDurationMs": 2700, "segs": [{"utf8": "Second line"}]}
            ]
        }"#;
        let snippets = parse_json3(body).unwrap();
        assert_eq!(snippets.len(), 3);
        assert_eq!(snippets[0], snippet(0.2, 1.9, "Hello world"));
        assert_eq!(snippets[1].duration, 0.0);

        let segments = normalize_snippets(snippets);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, 62.2);
    }

    #[test]
    fn test_parse_json3_rejects_garbage() {
        assert!(parse_json3("<transcript/>").is_err());
        assert!(parse_json3("{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_unavailable_not_error() {
        let captions = YoutubeCaptions::new(YoutubeExtractor::new("yt-dlp-not-installed-here"));
        let id = VideoId::resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        match captions.fetch(&id, "en").await.unwrap() {
            CaptionOutcome::Unavailable(reason) => {
                assert!(reason.starts_with("Unable to list captions for video 'dQw4w9WgXcQ'"))
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    fn video_id() -> VideoId {
        VideoId::resolve("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    /// Client that never goes through an environment proxy
    fn local_captions() -> YoutubeCaptions {
        YoutubeCaptions {
            youtube: YoutubeExtractor::default(),
            client: Client::builder().no_proxy().build().unwrap(),
        }
    }

    fn listing(json: &str) -> VideoInfo {
        serde_json::from_str(json).unwrap()
    }

    /// Tiny HTTP server answering `path -> (status, body)`; counts requests
    async fn serve(routes: Vec<(&'static str, u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or((404, ""));
                let response = format!(
                    "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (base, hits)
    }

    fn tracks(base: &str, languages: &[&str]) -> VideoInfo {
        let entries: Vec<String> = languages
            .iter()
            .map(|lang| {
                format!(
                    r#""{lang}": [{{"ext": "vtt", "url": "{base}/{lang}.vtt"}}, {{"ext": "json3", "url": "{base}/{lang}"}}]"#
                )
            })
            .collect();
        listing(&format!(r#"{{"subtitles": {{{}}}}}"#, entries.join(", ")))
    }

    #[test]
    fn test_pick_manual_track() {
        let info = listing(
            r#"{"subtitles": {"fr": [{"ext": "json3", "url": "x"}], "en": [{"ext": "json3", "url": "y"}], "de": []}}"#,
        );
        let langs = |l: &[&str]| l.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut failed = HashSet::new();

        assert_eq!(pick_manual_track(&info, &langs(&["de", "en"]), &failed), Some("en"));
        assert_eq!(pick_manual_track(&info, &langs(&["pt"]), &failed), None);

        failed.insert("en".to_string());
        assert_eq!(pick_manual_track(&info, &langs(&["en", "fr"]), &failed), Some("fr"));
        assert_eq!(pick_manual_track(&info, &langs(&["en"]), &failed), None);
    }

    #[tokio::test]
    async fn test_found_uses_track_language_and_one_line_text() {
        let (base, hits) = serve(vec![(
            "/de",
            200,
            r#"{"events": [{"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "line one\nline two"}]}, {"tStartMs": 1500, "dDurationMs": 500, "segs": [{"utf8": "next"}]}]}"#,
        )])
        .await;
        let captions = local_captions();

        let outcome = captions
            .fetch_from_listing(&video_id(), &tracks(&base, &["de", "en"]), "de")
            .await;

        match outcome {
            CaptionOutcome::Found { segments, language } => {
                assert_eq!(language, "de");
                assert_eq!(segments.len(), 2);
                assert_eq!(segments[0].text, "line one line two");
                assert_eq!((segments[0].start, segments[0].end), (0.0, 1.5));
            }
            other => panic!("expected captions, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_track_is_requested_once() {
        let (base, hits) = serve(vec![("/en", 500, "")]).await;
        let captions = local_captions();

        let outcome = captions
            .fetch_from_listing(&video_id(), &tracks(&base, &["en"]), "en")
            .await;

        match outcome {
            CaptionOutcome::Unavailable(reason) => {
                assert!(reason.starts_with("No manually created captions available for video 'dQw4w9WgXcQ'"));
                assert!(reason.contains("HTTP 500"), "{}", reason);
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_candidate_moves_on_to_the_next() {
        let (base, hits) = serve(vec![
            ("/de", 500, ""),
            ("/en", 200, r#"{"events": [{"tStartMs": 200, "dDurationMs": 1900, "segs": [{"utf8": "Hello world"}]}]}"#),
        ])
        .await;
        let captions = local_captions();

        let outcome = captions
            .fetch_from_listing(&video_id(), &tracks(&base, &["de", "en"]), "de")
            .await;

        match outcome {
            CaptionOutcome::Found { segments, language } => {
                assert_eq!(language, "en");
                assert_eq!(segments[0].text, "Hello world");
            }
            other => panic!("expected captions, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_track_with_only_blank_text_is_unavailable() {
        let (base, _) = serve(vec![(
            "/en",
            200,
            r#"{"events": [{"tStartMs": 0, "dDurationMs": 1000, "segs": [{"utf8": "  "}]}, {"tStartMs": 1000, "segs": [{"utf8": "\n"}]}]}"#,
        )])
        .await;
        let captions = local_captions();

        let outcome = captions
            .fetch_from_listing(&video_id(), &tracks(&base, &["en"]), "en")
            .await;
        assert_eq!(
            outcome,
            CaptionOutcome::Unavailable(
                "Captions were found but no usable text segments were returned".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_no_manual_track_makes_no_requests() {
        let (base, hits) = serve(vec![]).await;
        let captions = local_captions();

        match captions
            .fetch_from_listing(&video_id(), &tracks(&base, &["fr"]), "de")
            .await
        {
            CaptionOutcome::Unavailable(reason) => {
                assert!(reason.contains("no manually created transcript"), "{}", reason)
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_track_without_json3_is_unavailable() {
        let captions = local_captions();
        let info = listing(r#"{"subtitles": {"en": [{"ext": "vtt", "url": "http://127.0.0.1:9/x"}]}}"#);
        match captions.fetch_from_listing(&video_id(), &info, "en").await {
            CaptionOutcome::Unavailable(reason) => {
                assert!(reason.contains("no json3 rendition"), "{}", reason)
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }
}
