//! Upstream language-model access. Only the relay server talks to the model.

pub mod client;
pub mod types;

pub use client::AnthropicClient;

use std::future::Future;
use std::sync::Arc;

use futures::stream::BoxStream;

/// Text fragments in arrival order. Ends after the model stops, or after the first error.
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("ANTHROPIC_API_KEY not set. Create one at https://console.anthropic.com/settings/keys")]
    ApiKeyNotSet,

    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("upstream stream error ({kind}): {message}")]
    Stream { kind: String, message: String },

    #[error("upstream stream ended before completion")]
    Truncated,

    #[error("model returned no text")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A model that can answer a single-turn prompt, either whole or incrementally.
/// Implemented by `AnthropicClient`; scripted implementations are used in tests.
pub trait LanguageModel: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn stream(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<TokenStream, LlmError>> + Send;
}

impl<T: LanguageModel> LanguageModel for Arc<T> {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        (**self).complete(prompt, max_tokens)
    }

    fn stream(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<TokenStream, LlmError>> + Send {
        (**self).stream(prompt, max_tokens)
    }
}

/// A canned Messages API stream carrying `texts` as text deltas.
#[cfg(test)]
pub(crate) fn anthropic_sse_body(texts: &[&str]) -> String {
    let mut body =
        String::from("event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n");
    for text in texts {
        let delta = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        });
        body.push_str(&format!("event: content_block_delta\ndata: {delta}\n\n"));
    }
    body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    body
}
