//! Events carried on the relay's answer stream.
//!
//! On the wire every event is one JSON object in an SSE `data:` line:
//! `{"text":"..."}`, `{"done":true,"articlesUsed":N}` or `{"error":"..."}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub enum StreamEvent {
    TextDelta { text: String },
    Done { articles_used: usize },
    Error { message: String },
}

impl StreamEvent {
    /// `Done` and `Error` end a stream; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::TextDelta { .. })
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    articles_used: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<StreamEvent> for WireEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::TextDelta { text } => WireEvent {
                text: Some(text),
                ..Default::default()
            },
            StreamEvent::Done { articles_used } => WireEvent {
                done: true,
                articles_used: Some(articles_used),
                ..Default::default()
            },
            StreamEvent::Error { message } => WireEvent {
                error: Some(message),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<WireEvent> for StreamEvent {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, String> {
        if let Some(message) = wire.error {
            return Ok(StreamEvent::Error { message });
        }
        if wire.done {
            return Ok(StreamEvent::Done {
                articles_used: wire.articles_used.unwrap_or(0),
            });
        }
        match wire.text {
            Some(text) => Ok(StreamEvent::TextDelta { text }),
            None => Err("event has none of text, done or error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shapes() {
        let text = serde_json::to_value(StreamEvent::TextDelta { text: "Hi".into() }).unwrap();
        assert_eq!(text, json!({"text": "Hi"}));

        let done = serde_json::to_value(StreamEvent::Done { articles_used: 1 }).unwrap();
        assert_eq!(done, json!({"done": true, "articlesUsed": 1}));

        let error = serde_json::to_value(StreamEvent::error("boom")).unwrap();
        assert_eq!(error, json!({"error": "boom"}));
    }

    #[test]
    fn parses_relay_payloads() {
        let done: StreamEvent = serde_json::from_str(r#"{"done":true,"articlesUsed":2}"#).unwrap();
        assert_eq!(done, StreamEvent::Done { articles_used: 2 });

        let text: StreamEvent = serde_json::from_str(r#"{"text":""}"#).unwrap();
        assert_eq!(text, StreamEvent::TextDelta { text: String::new() });
    }

    #[test]
    fn rejects_empty_object() {
        assert!(serde_json::from_str::<StreamEvent>("{}").is_err());
    }

    #[test]
    fn only_text_is_non_terminal() {
        assert!(!StreamEvent::TextDelta { text: "a".into() }.is_terminal());
        assert!(StreamEvent::Done { articles_used: 0 }.is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
    }
}
