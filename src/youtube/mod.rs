use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use url::Url;

pub mod captions;

use crate::proxy::ProxyEndpoint;
use crate::transcript::{ClientFactory, TranscriptError, TranscriptFetcher, TranscriptSegment};
use crate::utils::extract_video_id;
use captions::{Json3Body, PlayerResponse};

const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

/// Transcript client for YouTube's innertube API
pub struct YoutubeTranscriptClient {
    client: Client,
    base_url: String,
}

impl YoutubeTranscriptClient {
    /// Build a client, routing all traffic through `proxy` when given
    pub fn new(
        base_url: impl Into<String>,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<Self, TranscriptError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let mut builder = Client::builder().default_headers(headers).timeout(timeout);

        if let Some(proxy) = proxy {
            // Plain and TLS requests both go through the same endpoint
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the watch page, accepting the consent interstitial once if shown
    async fn fetch_watch_page(&self, video_id: &str) -> Result<String, TranscriptError> {
        let html = self.get_watch_page(video_id, None).await?;
        if !captions::is_consent_page(&html) {
            return Ok(html);
        }

        tracing::debug!("Consent page shown for {}, retrying with cookie", video_id);
        let cookie = captions::consent_cookie(&html)
            .ok_or_else(|| TranscriptError::ConsentCookie(video_id.to_string()))?;

        let html = self.get_watch_page(video_id, Some(&cookie)).await?;
        if captions::is_consent_page(&html) {
            return Err(TranscriptError::ConsentCookie(video_id.to_string()));
        }

        Ok(html)
    }

    async fn get_watch_page(&self, video_id: &str, cookie: Option<&str>) -> Result<String, TranscriptError> {
        let mut request = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", video_id)]);

        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = check_status(request.send().await?)?;
        Ok(response.text().await?)
    }

    async fn fetch_player(&self, video_id: &str, api_key: &str) -> Result<PlayerResponse, TranscriptError> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .client
            .post(format!("{}/youtubei/v1/player", self.base_url))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let response = check_status(response)?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| TranscriptError::Unparsable {
            video_id: video_id.to_string(),
            detail: format!("player response: {}", e),
        })
    }

    async fn fetch_json3(&self, video_id: &str, base_url: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let url = json3_url(video_id, base_url)?;

        let response = check_status(self.client.get(url).send().await?)?;
        let text = response.text().await?;

        let body: Json3Body = serde_json::from_str(&text).map_err(|e| TranscriptError::Unparsable {
            video_id: video_id.to_string(),
            detail: format!("caption body: {}", e),
        })?;

        Ok(captions::json3_segments(body))
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptClient {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let video_id = extract_video_id(video_id)
            .ok_or_else(|| TranscriptError::InvalidVideoId(video_id.to_string()))?;

        let html = self.fetch_watch_page(&video_id).await?;
        let api_key = captions::extract_api_key(&html, &video_id)?;

        let player = self.fetch_player(&video_id, &api_key).await?;
        captions::check_playability(&video_id, &player)?;

        let tracks = captions::caption_tracks(&video_id, player)?;
        let track = captions::select_track(&video_id, &tracks, languages)?;
        tracing::debug!(
            "Using {} track '{}' for {}",
            if track.is_generated() { "generated" } else { "manual" },
            track.language_code,
            video_id
        );

        self.fetch_json3(&video_id, &track.base_url).await
    }
}

/// Rewrite a caption track URL to request the json3 format
fn json3_url(video_id: &str, base_url: &str) -> Result<Url, TranscriptError> {
    if base_url.contains("&exp=xpe") {
        return Err(TranscriptError::PoTokenRequired(video_id.to_string()));
    }

    let mut url = Url::parse(base_url).map_err(|e| TranscriptError::Unparsable {
        video_id: video_id.to_string(),
        detail: format!("caption track URL: {}", e),
    })?;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "json3");

    Ok(url)
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TranscriptError> {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => Err(TranscriptError::TooManyRequests),
        status if !status.is_success() => Err(TranscriptError::UpstreamStatus(status.as_u16())),
        _ => Ok(response),
    }
}

/// Creates a fresh [`YoutubeTranscriptClient`] per request
#[derive(Debug, Clone)]
pub struct YoutubeClientFactory {
    base_url: String,
    timeout: Duration,
}

impl YoutubeClientFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl ClientFactory for YoutubeClientFactory {
    fn make_client(
        &self,
        proxy: Option<ProxyEndpoint>,
    ) -> Result<Box<dyn TranscriptFetcher>, TranscriptError> {
        match &proxy {
            Some(endpoint) => tracing::info!("Using authenticated proxy: {}", endpoint),
            None => tracing::warn!("No proxies loaded, using direct connection"),
        }

        let client = YoutubeTranscriptClient::new(self.base_url.clone(), proxy.as_ref(), self.timeout)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyEndpoint, ProxyRecord};

    #[test]
    fn test_json3_url_replaces_format() {
        let url = json3_url("v", "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=srv3").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=json3");
    }

    #[test]
    fn test_json3_url_requires_po_token() {
        let result = json3_url("v", "https://www.youtube.com/api/timedtext?v=abc&exp=xpe&lang=en");
        assert!(matches!(result, Err(TranscriptError::PoTokenRequired(_))));
    }

    #[test]
    fn test_factory_builds_direct_and_proxied_clients() {
        let factory = YoutubeClientFactory::new("https://www.youtube.com", Duration::from_secs(5));
        assert!(factory.make_client(None).is_ok());

        let record = ProxyRecord::parse("127.0.0.1:3128:user:pass").unwrap();
        let endpoint = ProxyEndpoint::from_record(&record).unwrap();
        assert!(factory.make_client(Some(endpoint)).is_ok());
    }
}
