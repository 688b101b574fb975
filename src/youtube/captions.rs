//! Parsing of YouTube watch pages, innertube player responses and json3
//! caption bodies.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::transcript::{TranscriptError, TranscriptSegment};

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid regex")
});

static CONSENT_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("valid regex"));

const CONSENT_FORM_MARKER: &str = r#"action="https://consent.youtube.com/s""#;
const RECAPTCHA_MARKER: &str = r#"class="g-recaptcha""#;
const BOT_CHECK_REASON: &str = "Sign in to confirm you're not a bot";
const AGE_RESTRICTED_REASON: &str = "This video is age-restricted";
const UNAVAILABLE_REASON: &str = "This video is unavailable";

/// Innertube `/player` response, reduced to what transcript lookup needs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub playability_status: Option<PlayabilityStatus>,
    pub captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    pub tracklist: Option<CaptionTracklist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTracklist {
    #[serde(default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Auto-generated (speech recognition) track
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// json3 timed-text body
#[derive(Debug, Deserialize)]
pub struct Json3Body {
    #[serde(default)]
    pub events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Json3Event {
    #[serde(default)]
    pub t_start_ms: u64,
    #[serde(default)]
    pub d_duration_ms: u64,
    pub segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
pub struct Json3Seg {
    #[serde(default)]
    pub utf8: String,
}

/// True when the watch page is the EU cookie consent interstitial
pub fn is_consent_page(html: &str) -> bool {
    html.contains(CONSENT_FORM_MARKER)
}

/// Value for the `CONSENT` cookie taken from the consent form
pub fn consent_cookie(html: &str) -> Option<String> {
    CONSENT_VALUE_RE
        .captures(html)
        .map(|caps| format!("CONSENT=YES+{}", &caps[1]))
}

/// Pull the innertube API key out of a watch page
pub fn extract_api_key(html: &str, video_id: &str) -> Result<String, TranscriptError> {
    if let Some(caps) = API_KEY_RE.captures(html) {
        return Ok(caps[1].to_string());
    }

    if html.contains(RECAPTCHA_MARKER) {
        return Err(TranscriptError::IpBlocked(video_id.to_string()));
    }

    Err(TranscriptError::Unparsable {
        video_id: video_id.to_string(),
        detail: "watch page has no innertube API key".to_string(),
    })
}

/// Map a non-OK playability status onto an error
pub fn check_playability(video_id: &str, player: &PlayerResponse) -> Result<(), TranscriptError> {
    let Some(status) = &player.playability_status else {
        return Ok(());
    };

    let reason = status.reason.clone().unwrap_or_default();
    match status.status.as_str() {
        "OK" => Ok(()),
        "LOGIN_REQUIRED" if reason == BOT_CHECK_REASON => {
            Err(TranscriptError::RequestBlocked(video_id.to_string()))
        }
        "LOGIN_REQUIRED" if reason == AGE_RESTRICTED_REASON => {
            Err(TranscriptError::AgeRestricted(video_id.to_string()))
        }
        "ERROR" if reason == UNAVAILABLE_REASON => {
            Err(TranscriptError::VideoUnavailable(video_id.to_string()))
        }
        _ => Err(TranscriptError::VideoUnplayable {
            video_id: video_id.to_string(),
            reason: if reason.is_empty() { status.status.clone() } else { reason },
        }),
    }
}

/// Caption tracks of a playable video
pub fn caption_tracks(video_id: &str, player: PlayerResponse) -> Result<Vec<CaptionTrack>, TranscriptError> {
    player
        .captions
        .and_then(|captions| captions.tracklist)
        .map(|tracklist| tracklist.caption_tracks)
        .filter(|tracks| !tracks.is_empty())
        .ok_or_else(|| TranscriptError::TranscriptsDisabled(video_id.to_string()))
}

/// Pick a track: for each language in order, a manual track beats a generated one
pub fn select_track<'a>(
    video_id: &str,
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Result<&'a CaptionTrack, TranscriptError> {
    for language in languages {
        let manual = tracks
            .iter()
            .find(|track| !track.is_generated() && &track.language_code == language);
        let generated = || {
            tracks
                .iter()
                .find(|track| track.is_generated() && &track.language_code == language)
        };

        if let Some(track) = manual.or_else(generated) {
            return Ok(track);
        }
    }

    Err(TranscriptError::NoTranscriptFound {
        video_id: video_id.to_string(),
        requested: languages.to_vec(),
        available: tracks.iter().map(|track| track.language_code.clone()).collect(),
    })
}

/// Turn json3 events into segments, keeping order and dropping empty ones
pub fn json3_segments(body: Json3Body) -> Vec<TranscriptSegment> {
    body.events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|seg| seg.utf8).collect();
            if text.trim().is_empty() {
                return None;
            }

            Some(TranscriptSegment::new(
                text,
                event.t_start_ms as f64 / 1000.0,
                event.d_duration_ms as f64 / 1000.0,
            ))
        })
        .collect()
}
