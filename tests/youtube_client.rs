use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;
use transcript_relay::server::create_router;
use transcript_relay::{
    AppState, ProxyEndpoint, ProxyPool, ProxyRecord, TranscriptError, TranscriptFetcher, YoutubeClientFactory,
    YoutubeTranscriptClient,
};
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO_ID: &str = "abc123XYZ_0";
const TIMEOUT: Duration = Duration::from_secs(5);

fn watch_page(api_key: &str) -> String {
    format!(
        r#"<html><script>ytcfg.set({{"INNERTUBE_API_KEY":"{}","HL":"en"}});</script></html>"#,
        api_key
    )
}

fn player_with_tracks(server: &MockServer) -> Value {
    json!({
        "playabilityStatus": {"status": "OK"},
        "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {
                "baseUrl": format!("{}/api/timedtext?v={}&lang=en&kind=asr&fmt=srv3", server.uri(), VIDEO_ID),
                "languageCode": "en",
                "kind": "asr"
            },
            {
                "baseUrl": format!("{}/api/timedtext?v={}&lang=en", server.uri(), VIDEO_ID),
                "languageCode": "en"
            }
        ]}}
    })
}

fn json3_body() -> Value {
    json!({"events": [
        {"tStartMs": 0, "dDurationMs": 600000, "id": 1},
        {"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "Never gonna"}]},
        {"tStartMs": 1500, "dDurationMs": 2000, "segs": [{"utf8": "give you "}, {"utf8": "up"}]},
        {"tStartMs": 3500, "dDurationMs": 1250, "segs": [{"utf8": "never gonna let you down"}]}
    ]})
}

async fn mount_watch_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", VIDEO_ID))
        .respond_with(ResponseTemplate::new(200).set_body_string(watch_page("TESTKEY")))
        .mount(server)
        .await;
}

async fn mount_player(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/youtubei/v1/player"))
        .and(query_param("key", "TESTKEY"))
        .and(body_partial_json(json!({"videoId": VIDEO_ID})))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_manual_track(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("fmt", "json3"))
        .and(query_param("lang", "en"))
        .and(query_param_is_missing("kind"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json3_body()))
        .expect(1)
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> YoutubeTranscriptClient {
    YoutubeTranscriptClient::new(server.uri(), None, TIMEOUT).unwrap()
}

fn en() -> Vec<String> {
    vec!["en".to_string()]
}

#[tokio::test]
async fn fetches_manual_track_in_order() {
    let server = MockServer::start().await;
    mount_watch_page(&server).await;
    let player = player_with_tracks(&server);
    mount_player(&server, player).await;
    mount_manual_track(&server).await;

    let segments = client(&server).fetch(VIDEO_ID, &en()).await.unwrap();

    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].text, "Never gonna");
    assert_eq!(segments[1].text, "give you up");
    assert_eq!(segments[1].start, 1.5);
    assert_eq!(segments[1].duration, 2.0);
    assert_eq!(segments[2].start, 3.5);
}

#[tokio::test]
async fn accepts_full_watch_urls() {
    let server = MockServer::start().await;
    mount_watch_page(&server).await;
    let player = player_with_tracks(&server);
    mount_player(&server, player).await;
    mount_manual_track(&server).await;

    let url = format!("https://www.youtube.com/watch?v={}&t=10", VIDEO_ID);
    let segments = client(&server).fetch(&url, &en()).await.unwrap();

    assert_eq!(segments.len(), 3);
}

#[tokio::test]
async fn rejects_links_without_an_id() {
    let server = MockServer::start().await;

    let result = client(&server)
        .fetch("https://www.youtube.com/feed/trending", &en())
        .await;

    assert!(matches!(result, Err(TranscriptError::InvalidVideoId(_))));
}

#[tokio::test]
async fn reports_disabled_subtitles() {
    let server = MockServer::start().await;
    mount_watch_page(&server).await;
    mount_player(&server, json!({"playabilityStatus": {"status": "OK"}})).await;

    let result = client(&server).fetch(VIDEO_ID, &en()).await;

    assert!(matches!(result, Err(TranscriptError::TranscriptsDisabled(_))));
}

#[tokio::test]
async fn reports_missing_language() {
    let server = MockServer::start().await;
    mount_watch_page(&server).await;
    let player = player_with_tracks(&server);
    mount_player(&server, player).await;

    let result = client(&server).fetch(VIDEO_ID, &["de".to_string()]).await;

    match result {
        Err(TranscriptError::NoTranscriptFound { available, .. }) => {
            assert_eq!(available, vec!["en", "en"]);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn reports_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client(&server).fetch(VIDEO_ID, &en()).await;

    assert!(matches!(result, Err(TranscriptError::TooManyRequests)));
}

#[tokio::test]
async fn retries_once_with_consent_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(header("cookie", "CONSENT=YES+cb.123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(watch_page("TESTKEY")))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form action="https://consent.youtube.com/s"><input type="hidden" name="v" value="cb.123"></form>"#,
        ))
        .with_priority(2)
        .mount(&server)
        .await;
    let player = player_with_tracks(&server);
    mount_player(&server, player).await;
    mount_manual_track(&server).await;

    let segments = client(&server).fetch(VIDEO_ID, &en()).await.unwrap();

    assert_eq!(segments.len(), 3);
}

#[tokio::test]
async fn relay_serves_upstream_transcript_end_to_end() {
    let server = MockServer::start().await;
    mount_watch_page(&server).await;
    let player = player_with_tracks(&server);
    mount_player(&server, player).await;
    mount_manual_track(&server).await;

    let factory = Arc::new(YoutubeClientFactory::new(server.uri(), TIMEOUT));
    let router = create_router(AppState::new(ProxyPool::empty(), factory, en()));

    let request = Request::builder()
        .uri(format!("/transcript/{}", VIDEO_ID))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["videoId"], VIDEO_ID);
    assert_eq!(
        body["transcript"][2],
        json!({"text": "never gonna let you down", "start": 3.5, "duration": 1.25})
    );
}

#[tokio::test]
async fn routes_requests_through_authenticated_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&proxy)
        .await;

    let record = ProxyRecord::parse(&format!("127.0.0.1:{}:us@er:p/ss", proxy.address().port())).unwrap();
    let endpoint = ProxyEndpoint::from_record(&record).unwrap();
    let client = YoutubeTranscriptClient::new("http://youtube.invalid", Some(&endpoint), TIMEOUT).unwrap();

    let result = client.fetch("abc", &en()).await;
    assert!(matches!(result, Err(TranscriptError::TooManyRequests)));

    let received = proxy.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let request = &received[0];
    assert_eq!(request.method.as_str(), "GET");
    assert_eq!(request.url.host_str(), Some("youtube.invalid"));
    assert_eq!(request.url.path(), "/watch");
    assert_eq!(request.url.query(), Some("v=abc"));

    let auth = request
        .headers
        .get("proxy-authorization")
        .expect("proxy credentials sent")
        .to_str()
        .unwrap();
    let encoded = auth.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "us@er:p/ss");
}
