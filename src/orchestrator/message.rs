use serde::Serialize;

use crate::article::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// One entry in the conversation log.
///
/// `sources` is set only on assistant replies that were grounded in articles.
/// `streaming` stays true while deltas are still being appended to `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Article>>,
    pub streaming: bool,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            streaming: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: None,
            streaming: false,
        }
    }

    /// An empty assistant reply that deltas will be appended to.
    pub fn pending_answer(sources: Vec<Article>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            sources: Some(sources),
            streaming: true,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            sources: None,
            streaming: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_role_lowercase_and_omits_missing_sources() {
        let json = serde_json::to_value(ConversationMessage::user("Who?")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "Who?", "streaming": false}));
    }

    #[test]
    fn pending_answer_is_streaming_with_sources() {
        let msg = ConversationMessage::pending_answer(vec![Article::new("A", "", "")]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.streaming);
        assert!(msg.content.is_empty());
        assert_eq!(msg.sources.map(|s| s.len()), Some(1));
    }
}
