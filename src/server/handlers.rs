use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use tracing::{info, warn};

use super::AppState;
use crate::api::{ChatRequest, ErrorBody, KeywordRequest, KeywordResponse, required_query};
use crate::keywords;
use crate::llm::LlmError;
use crate::relay;

const QUERY_REQUIRED: &str = "Query is required";

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn extract_keywords(
    State(state): State<Arc<AppState>>,
    body: Result<Json<KeywordRequest>, JsonRejection>,
) -> (StatusCode, Json<KeywordResponse>) {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "keyword extraction rejected: invalid body");
            return keywords_rejected(rejection.body_text());
        }
    };
    let Some(query) = required_query(request.query.as_deref()) else {
        warn!("keyword extraction rejected: no query");
        return keywords_rejected(QUERY_REQUIRED.to_string());
    };

    info!(query = %query, "api:extract-keywords");

    match keywords::extract_keywords(&state.llm, query).await {
        Ok(keywords) => (
            StatusCode::OK,
            Json(KeywordResponse {
                success: true,
                keywords,
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "keyword extraction failed, falling back to query");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(KeywordResponse {
                    success: false,
                    keywords: query.to_string(),
                    error: Some(llm_error_message(&e)),
                }),
            )
        }
    }
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "chat stream rejected: invalid body");
            return bad_request(rejection.body_text());
        }
    };
    let Some(query) = required_query(request.query.as_deref()).map(str::to_string) else {
        warn!("chat stream rejected: no query");
        return bad_request(QUERY_REQUIRED.to_string());
    };

    info!(query = %query, articles = request.articles.len(), "api:chat-stream");

    let events = relay::stream_answer(state.llm.clone(), query, request.articles)
        .map(|event| Event::default().json_data(&event));

    // Reverse proxies such as nginx otherwise hold the stream back in their buffers.
    ([("x-accel-buffering", "no")], Sse::new(events)).into_response()
}

fn keywords_rejected(error: String) -> (StatusCode, Json<KeywordResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(KeywordResponse {
            success: false,
            keywords: String::new(),
            error: Some(error),
        }),
    )
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
}

fn llm_error_message(e: &LlmError) -> String {
    match e {
        LlmError::RateLimited => format!("{e} (retriable)"),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_is_marked_retriable() {
        assert!(llm_error_message(&LlmError::RateLimited).contains("retriable"));
        assert!(!llm_error_message(&LlmError::EmptyCompletion).contains("retriable"));
    }
}
