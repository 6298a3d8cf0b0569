use serde::{Deserialize, Serialize};

/// A Wikipedia article summary used to ground answers.
///
/// Built once by the Wikipedia client and passed around by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub extract: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, extract: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            extract: extract.into(),
            url: url.into(),
            thumbnail: None,
        }
    }
}
