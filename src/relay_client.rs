//! Client side of the relay: keyword extraction and answer streaming over HTTP.

use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::api::{ChatRequest, ErrorBody, KeywordRequest, KeywordResponse};
use crate::article::Article;
use crate::event::StreamEvent;
use crate::orchestrator::{AnswerSource, KeywordExtractor};
use crate::sse;

pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";
const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("relay rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("relay returned no keywords")]
    NoKeywords,

    #[error("answer stream ended without a final event")]
    Incomplete,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn request_keywords(&self, question: &str) -> Result<String, RelayClientError> {
        let response = self
            .http
            .post(format!("{}/api/extract-keywords", self.base_url))
            .header("User-Agent", crate::USER_AGENT)
            .json(&KeywordRequest {
                query: Some(question.to_string()),
            })
            .send()
            .await?;

        let status = response.status();
        let body: KeywordResponse = response.json().await?;
        if !status.is_success() || !body.success {
            return Err(RelayClientError::Rejected {
                code: status.as_u16(),
                message: body.error.unwrap_or_default(),
            });
        }

        let keywords = body.keywords.trim();
        if keywords.is_empty() {
            return Err(RelayClientError::NoKeywords);
        }
        Ok(keywords.to_string())
    }

    async fn open_stream(
        &self,
        question: &str,
        articles: &[Article],
    ) -> Result<Response, RelayClientError> {
        let response = self
            .http
            .post(format!("{}/api/chat/stream", self.base_url))
            .header("User-Agent", crate::USER_AGENT)
            .header("Accept", "text/event-stream")
            .json(&ChatRequest {
                query: Some(question.to_string()),
                articles: articles.to_vec(),
            })
            .timeout(STREAM_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(RelayClientError::Rejected {
                code: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

impl KeywordExtractor for RelayClient {
    /// Falls back to the question itself on any failure.
    async fn extract_keywords(&self, question: &str) -> String {
        match self.request_keywords(question).await {
            Ok(keywords) => {
                debug!(question = %question, keywords = %keywords, "keywords extracted");
                keywords
            }
            Err(e) => {
                warn!(error = %e, "keyword extraction failed, searching with the question");
                question.to_string()
            }
        }
    }
}

impl AnswerSource for RelayClient {
    async fn stream_answer(
        &self,
        question: &str,
        articles: &[Article],
    ) -> BoxStream<'static, StreamEvent> {
        match self.open_stream(question, articles).await {
            Ok(response) => event_stream(response),
            Err(e) => {
                warn!(error = %e, "could not open answer stream");
                stream::once(future::ready(StreamEvent::error(e.to_string()))).boxed()
            }
        }
    }
}

/// Decode relay events, ending after the first terminal one.
///
/// A record that is complete but not a valid event is logged and skipped. A body that
/// ends, or a connection that drops, before a terminal event yields a final `Error`.
fn event_stream(response: Response) -> BoxStream<'static, StreamEvent> {
    let state = (sse::record_stream(response), false);
    stream::unfold(state, |(mut records, ended)| async move {
        if ended {
            return None;
        }
        loop {
            let event = match records.next().await {
                Some(Ok(record)) if record.data.is_empty() => continue,
                Some(Ok(record)) => match serde_json::from_str::<StreamEvent>(&record.data) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, data = %record.data, "skipping malformed stream record");
                        continue;
                    }
                },
                Some(Err(e)) => StreamEvent::error(format!("connection lost: {e}")),
                None => StreamEvent::error(RelayClientError::Incomplete.to_string()),
            };
            let ended = event.is_terminal();
            return Some((event, (records, ended)));
        }
    })
    .boxed()
}
