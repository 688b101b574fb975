use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::transcript::{BatchEntry, TranscriptResult};
use crate::utils::parse_language_list;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "running",
            message: "YouTube Transcript API Server is running",
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct TranscriptQuery {
    /// Comma-separated language codes, most preferred first
    pub languages: Option<String>,
}

/// `GET /transcript/{video_id}`
///
/// Path and query rejections are answered with the same failure envelope as
/// upstream errors.
pub async fn transcript_handler(
    State(state): State<AppState>,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<TranscriptQuery>, QueryRejection>,
) -> Response {
    let video_id = match path {
        Ok(Path(video_id)) => video_id,
        Err(rejection) => {
            return transcript_response(TranscriptResult::Failure {
                video_id: raw_video_id(&uri),
                error: rejection.body_text(),
            })
        }
    };

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return transcript_response(TranscriptResult::Failure {
                video_id,
                error: rejection.body_text(),
            })
        }
    };

    tracing::info!("Fetching transcript for video: {}", video_id);

    let languages = state.languages_or(query.languages.as_deref().map(parse_language_list));
    let outcome = match state.make_client() {
        Ok(client) => client.fetch(&video_id, &languages).await,
        Err(e) => Err(e),
    };

    transcript_response(TranscriptResult::from_fetch(video_id, outcome))
}

/// Last path segment as sent, still percent-encoded
fn raw_video_id(uri: &Uri) -> String {
    uri.path().rsplit('/').next().unwrap_or_default().to_string()
}

fn transcript_response(result: TranscriptResult) -> Response {
    match &result {
        TranscriptResult::Success { video_id, segments } => {
            tracing::info!("Fetched {} segments for {}", segments.len(), video_id)
        }
        TranscriptResult::Failure { video_id, error } => {
            tracing::error!("Error fetching transcript for {}: {}", video_id, error)
        }
    }

    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result)).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub video_ids: Option<Vec<String>>,

    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

#[derive(Serialize)]
struct BatchResponse<'a> {
    success: bool,
    results: IndexMap<&'a str, BatchEntry<'a>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn batch_error(error: impl Into<String>) -> Response {
    let body = ErrorResponse {
        success: false,
        error: error.into(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// `POST /transcript/batch`
///
/// One proxy and client serve the whole batch. Ids are fetched one after
/// another and each failure stays confined to its own entry.
pub async fn batch_handler(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::error!("Batch request error: {}", rejection.body_text());
            return batch_error(rejection.body_text());
        }
    };

    let video_ids = request.video_ids.unwrap_or_default();
    if video_ids.is_empty() {
        return batch_error("No video IDs provided");
    }

    tracing::info!("Batch fetching transcripts for {} videos", video_ids.len());

    let languages = state.languages_or(request.languages);
    let client = match state.make_client() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Batch request error: {}", e);
            return batch_error(e.to_string());
        }
    };

    let mut results: IndexMap<String, TranscriptResult> = IndexMap::new();
    for video_id in video_ids {
        if results.contains_key(&video_id) {
            continue;
        }

        let outcome = client.fetch(&video_id, &languages).await;
        if let Err(e) = &outcome {
            tracing::warn!("Batch item {} failed: {}", video_id, e);
        }
        results.insert(video_id.clone(), TranscriptResult::from_fetch(video_id, outcome));
    }

    let succeeded = results.values().filter(|result| result.is_success()).count();
    tracing::info!("Batch complete: {}/{} succeeded", succeeded, results.len());

    let body = BatchResponse {
        success: true,
        results: results
            .iter()
            .map(|(video_id, result)| (video_id.as_str(), result.entry()))
            .collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}
