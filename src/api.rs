//! JSON bodies exchanged between the relay server and its clients.

use serde::{Deserialize, Serialize};

use crate::article::Article;

#[derive(Debug, Serialize, Deserialize)]
pub struct KeywordRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeywordResponse {
    pub success: bool,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// Non-stream error body, e.g. for a rejected chat request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The trimmed query, or `None` when it is missing or blank.
pub fn required_query(query: Option<&str>) -> Option<&str> {
    query.map(str::trim).filter(|q| !q.is_empty())
}
