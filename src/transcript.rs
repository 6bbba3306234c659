//! YouTube video transcripts.
//!
//! [`parse_video_id`] accepts the common URL shapes (`watch?v=`,
//! `youtu.be/`, `/shorts/`, `/embed/`, `/live/`) or a bare 11-character id.
//! [`TranscriptClient`] asks the player endpoint for the video's title and
//! caption tracks, then downloads the chosen track as timedtext XML.

use std::borrow::Cow;
use std::sync::LazyLock;
use std::time::Duration;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::Event;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use study_harness_core::StudyError;

use crate::config::TranscriptConfig;

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

/// An ordered caption track plus the video's title.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub video_id: String,
    pub title: String,
    pub segments: Vec<String>,
}

impl Transcript {
    /// Segments joined with single spaces.
    pub fn text(&self) -> String {
        self.segments.join(" ")
    }

    pub fn label(&self) -> String {
        format!("YouTube: {}", self.title)
    }
}

/// True when `raw` points at a YouTube host.
pub fn is_youtube_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(is_youtube_host))
        .unwrap_or(false)
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    matches!(host, "youtube.com" | "music.youtube.com" | "youtu.be" | "youtube-nocookie.com")
}

/// Extract the video id from a YouTube URL or a bare id.
pub fn parse_video_id(raw: &str) -> Result<String, StudyError> {
    let raw = raw.trim();
    if VIDEO_ID.is_match(raw) {
        return Ok(raw.to_string());
    }
    let invalid = || StudyError::InvalidSource(format!("invalid YouTube URL: {}", raw));

    let url = Url::parse(raw).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    if !is_youtube_host(host) {
        return Err(invalid());
    }

    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    let candidate = if host.ends_with("youtu.be") {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate
        .filter(|id| VIDEO_ID.is_match(id))
        .ok_or_else(invalid)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    video_details: Option<VideoDetails>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: TrackList,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackList {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// `"asr"` for auto-generated captions.
    kind: Option<String>,
}

impl CaptionTrack {
    fn matches_lang(&self, lang: &str) -> bool {
        self.language_code == lang
            || self
                .language_code
                .strip_prefix(lang)
                .is_some_and(|rest| rest.starts_with('-'))
    }

    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Fetches caption tracks and titles through the player endpoint.
#[derive(Clone)]
pub struct TranscriptClient {
    client: reqwest::Client,
    config: TranscriptConfig,
}

impl TranscriptClient {
    pub fn new(config: TranscriptConfig, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "com.google.android.youtube/{} (Linux; U; Android 14) gzip",
                config.client_version
            ))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch the transcript for `video_id`.
    ///
    /// Looks the video up on the player endpoint, picks a caption track in
    /// the configured language, then downloads that track. Fails with
    /// [`StudyError::NoTranscriptAvailable`] when the video has no usable
    /// captions.
    pub async fn fetch(&self, video_id: &str) -> Result<Transcript, StudyError> {
        let player = self.player(video_id).await?;

        if let Some(status) = &player.playability_status {
            if status.status == "ERROR" {
                let reason = status.reason.as_deref().unwrap_or("video unavailable");
                return Err(StudyError::InvalidSource(format!("{}: {}", video_id, reason)));
            }
        }

        let tracks = player
            .captions
            .map(|c| c.player_captions_tracklist_renderer.caption_tracks)
            .unwrap_or_default();
        let track = pick_track(&tracks, &self.config.lang)
            .ok_or_else(|| StudyError::NoTranscriptAvailable(video_id.to_string()))?;
        tracing::debug!(
            video_id,
            lang = %track.language_code,
            generated = track.is_generated(),
            "selected caption track"
        );

        let segments = self.track_segments(track, video_id).await?;
        if segments.is_empty() {
            return Err(StudyError::NoTranscriptAvailable(video_id.to_string()));
        }

        let title = player
            .video_details
            .and_then(|d| d.title)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                tracing::debug!(video_id, "no title in player response, using video id");
                video_id.to_string()
            });

        Ok(Transcript {
            video_id: video_id.to_string(),
            title,
            segments,
        })
    }

    async fn player(&self, video_id: &str) -> Result<PlayerResponse, StudyError> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": self.config.client_name,
                    "clientVersion": self.config.client_version,
                    "hl": self.config.lang,
                }
            },
            "videoId": video_id,
        });
        let response = self
            .client
            .post(&self.config.player_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudyError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StudyError::FetchFailed(format!(
                "player request returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| StudyError::FetchFailed(format!("unreadable player response: {}", e)))
    }

    async fn track_segments(
        &self,
        track: &CaptionTrack,
        video_id: &str,
    ) -> Result<Vec<String>, StudyError> {
        let url = track_url(&track.base_url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StudyError::FetchFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StudyError::NoTranscriptAvailable(video_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(StudyError::FetchFailed(format!(
                "caption track request returned {}",
                response.status()
            )));
        }
        let xml = response
            .text()
            .await
            .map_err(|e| StudyError::FetchFailed(e.to_string()))?;

        parse_timedtext(&xml)
            .map_err(|e| StudyError::FetchFailed(format!("unreadable caption track: {}", e)))
    }
}

/// Choose the caption track to download.
///
/// Manual captions in `lang` (or a regional variant such as `en-GB`) win
/// over auto-generated ones; with nothing in `lang`, the first track is used.
fn pick_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.matches_lang(lang) && !t.is_generated())
        .or_else(|| tracks.iter().find(|t| t.matches_lang(lang)))
        .or_else(|| tracks.first())
}

/// The track's URL with the `fmt` parameter dropped, so the endpoint
/// answers with the plain `<text>` format.
fn track_url(base_url: &str) -> Result<Url, StudyError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| StudyError::FetchFailed(format!("bad caption track URL: {}", e)))?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Ok(url)
}

/// Parse timedtext XML into non-empty caption segments, in order.
///
/// Both the `<text>` and the `<p>` track formats are accepted. Caption text
/// is often escaped twice, so entities left after XML unescaping are
/// decoded again; a lone `&` that is not an entity is kept as is.
pub fn parse_timedtext(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if is_cue(e.local_name().as_ref()) => {
                current = Some(String::new());
            }
            Event::Text(t) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&t.unescape_with(resolve_html5_entity)?);
                }
            }
            Event::End(e) if is_cue(e.local_name().as_ref()) => {
                if let Some(buf) = current.take() {
                    let decoded = unescape_with(&buf, resolve_html5_entity)
                        .unwrap_or(Cow::Borrowed(buf.as_str()));
                    let text = decoded.replace('\n', " ");
                    let text = text.trim();
                    if !text.is_empty() {
                        segments.push(text.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(segments)
}

fn is_cue(name: &[u8]) -> bool {
    name == b"text" || name == b"p"
}
