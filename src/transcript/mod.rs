use async_trait::async_trait;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::proxy::ProxyEndpoint;

/// One timed unit of subtitle text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment text
    pub text: String,

    /// Start offset in seconds
    pub start: f64,

    /// Length in seconds
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Errors raised while retrieving a transcript from upstream
///
/// The display message is what clients see in the `error` field.
#[derive(thiserror::Error, Debug)]
pub enum TranscriptError {
    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("Video {0} is unavailable")]
    VideoUnavailable(String),

    #[error("Video {video_id} is unplayable: {reason}")]
    VideoUnplayable { video_id: String, reason: String },

    #[error("Video {0} is age restricted")]
    AgeRestricted(String),

    #[error("YouTube is blocking requests from this IP (bot check) for video {0}")]
    RequestBlocked(String),

    #[error("YouTube is blocking requests from this IP (captcha) for video {0}")]
    IpBlocked(String),

    #[error("YouTube is rate limiting requests from this IP")]
    TooManyRequests,

    #[error("Failed to accept the YouTube consent page for video {0}")]
    ConsentCookie(String),

    #[error("Subtitles are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("No transcript found for video {video_id} in languages {requested:?} (available: {available:?})")]
    NoTranscriptFound {
        video_id: String,
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("Transcript for video {0} requires a PO token")]
    PoTokenRequired(String),

    #[error("Could not parse YouTube response for video {video_id}: {detail}")]
    Unparsable { video_id: String, detail: String },

    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outcome of fetching one video's transcript
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptResult {
    Success {
        video_id: String,
        segments: Vec<TranscriptSegment>,
    },
    Failure {
        video_id: String,
        error: String,
    },
}

impl TranscriptResult {
    /// Build a result from a fetch outcome, keeping the error's message
    pub fn from_fetch(
        video_id: impl Into<String>,
        outcome: Result<Vec<TranscriptSegment>, TranscriptError>,
    ) -> Self {
        let video_id = video_id.into();
        match outcome {
            Ok(segments) => Self::Success { video_id, segments },
            Err(e) => Self::Failure {
                video_id,
                error: e.to_string(),
            },
        }
    }

    pub fn video_id(&self) -> &str {
        match self {
            Self::Success { video_id, .. } | Self::Failure { video_id, .. } => video_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// View of this result without the video id, as used inside batch responses
    pub fn entry(&self) -> BatchEntry<'_> {
        BatchEntry(self)
    }

    fn serialize_fields<S: SerializeStruct>(&self, state: &mut S) -> Result<(), S::Error> {
        match self {
            Self::Success { segments, .. } => state.serialize_field("transcript", segments),
            Self::Failure { error, .. } => state.serialize_field("error", error),
        }
    }
}

impl Serialize for TranscriptResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TranscriptResult", 3)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("videoId", self.video_id())?;
        self.serialize_fields(&mut state)?;
        state.end()
    }
}

/// Batch flavour of [`TranscriptResult`]; the id is the key of the enclosing map
#[derive(Debug, Clone, Copy)]
pub struct BatchEntry<'a>(&'a TranscriptResult);

impl Serialize for BatchEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BatchEntry", 2)?;
        state.serialize_field("success", &self.0.is_success())?;
        self.0.serialize_fields(&mut state)?;
        state.end()
    }
}

/// Retrieves transcripts from the upstream provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch the ordered segments for a video, preferring `languages` in order
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

/// Builds a fetcher routed through one proxy, or direct when there is none
#[cfg_attr(test, mockall::automock)]
pub trait ClientFactory: Send + Sync {
    fn make_client(
        &self,
        proxy: Option<ProxyEndpoint>,
    ) -> Result<Box<dyn TranscriptFetcher>, TranscriptError>;
}
