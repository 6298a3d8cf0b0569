use std::env;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::types::{Delta, ErrorEnvelope, Message, MessagesRequest, MessagesResponse, StreamPayload};
use super::{LanguageModel, LlmError, TokenStream};
use crate::sse::{self, SseRecord};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Covers the whole streamed answer, not just the first byte.
const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Client for the Anthropic Messages API.
///
/// Configuration via environment variables:
/// - `ANTHROPIC_API_KEY`: required
/// - `ANTHROPIC_MODEL`: model id (default `claude-sonnet-4-20250514`)
/// - `ANTHROPIC_BASE_URL`: API origin (default `https://api.anthropic.com`)
#[derive(Clone, Debug)]
pub struct AnthropicClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn from_env(http: Client) -> Result<Self, LlmError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotSet);
        }
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model: env_or("ANTHROPIC_MODEL", DEFAULT_MODEL),
            base_url: env_or("ANTHROPIC_BASE_URL", API_BASE),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        prompt: &str,
        max_tokens: u32,
        stream: bool,
    ) -> Result<Response, LlmError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message::user(prompt)],
            stream,
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key.0)
            .header("anthropic-version", API_VERSION)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(if stream { STREAM_TIMEOUT } else { REQUEST_TIMEOUT })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Anthropic API rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<ErrorEnvelope>(&text) {
                let message = body
                    .error
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string());
                warn!(status = %status, %message, "Anthropic API error");
                return Err(LlmError::Api {
                    code: status.as_u16(),
                    message,
                });
            }
            let end = text.floor_char_boundary(200);
            warn!(status = %status, "Anthropic API error (no structured body)");
            return Err(LlmError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {}", &text[..end]),
            });
        }

        Ok(response)
    }
}

impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body: MessagesResponse = self.send(prompt, max_tokens, false).await?.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }

    async fn stream(&self, prompt: &str, max_tokens: u32) -> Result<TokenStream, LlmError> {
        let response = self.send(prompt, max_tokens, true).await?;
        debug!(model = %self.model, "answer stream opened");

        let state = (sse::record_stream(response), false);
        let tokens = stream::unfold(state, |(mut records, finished)| async move {
            if finished {
                return None;
            }
            loop {
                let step = match records.next().await {
                    Some(Ok(record)) => parse_stream_record(&record),
                    Some(Err(e)) => StreamStep::Fail(e.into()),
                    None => StreamStep::Fail(LlmError::Truncated),
                };
                match step {
                    StreamStep::Text(text) => return Some((Ok(text), (records, false))),
                    StreamStep::Skip => continue,
                    StreamStep::Stop => return None,
                    StreamStep::Fail(e) => return Some((Err(e), (records, true))),
                }
            }
        });
        Ok(tokens.boxed())
    }
}

enum StreamStep {
    Text(String),
    Skip,
    Stop,
    Fail(LlmError),
}

fn parse_stream_record(record: &SseRecord) -> StreamStep {
    if record.data.is_empty() {
        return StreamStep::Skip;
    }
    let payload = match serde_json::from_str::<StreamPayload>(&record.data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, event = ?record.event, "skipping unparsable stream event");
            return StreamStep::Skip;
        }
    };
    match payload {
        StreamPayload::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } if !text.is_empty() => StreamStep::Text(text),
        StreamPayload::MessageStop => StreamStep::Stop,
        StreamPayload::Error { error } => StreamStep::Fail(LlmError::Stream {
            kind: error.kind.unwrap_or_else(|| "error".to_string()),
            message: error.message.unwrap_or_else(|| "Unknown error".to_string()),
        }),
        _ => StreamStep::Skip,
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
