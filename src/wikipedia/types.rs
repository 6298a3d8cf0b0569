use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::article::Article;

/// OpenSearch returns a positional array: `[query, titles, descriptions, urls]`.
/// Only the titles are used; summaries carry their own URLs.
#[derive(Debug, Deserialize)]
pub struct OpenSearchResponse(IgnoredAny, Vec<String>, IgnoredAny, IgnoredAny);

impl OpenSearchResponse {
    pub fn into_titles(self) -> Vec<String> {
        self.1
    }
}

#[derive(Debug, Deserialize)]
pub struct PageSummary {
    pub title: String,
    #[serde(default)]
    pub extract: String,
    pub content_urls: Option<ContentUrls>,
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct ContentUrls {
    pub desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
pub struct PageUrl {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub source: Option<String>,
}

impl From<PageSummary> for Article {
    fn from(summary: PageSummary) -> Self {
        let url = summary
            .content_urls
            .and_then(|urls| urls.desktop)
            .and_then(|desktop| desktop.page)
            .unwrap_or_default();
        Article {
            thumbnail: summary.thumbnail.and_then(|t| t.source),
            ..Article::new(summary.title, summary.extract, url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opensearch_tuple_parses() {
        let parsed: OpenSearchResponse = serde_json::from_str(
            r#"["curie",["Marie Curie","Pierre Curie"],["",""],["https://en.wikipedia.org/wiki/Marie_Curie","https://en.wikipedia.org/wiki/Pierre_Curie"]]"#,
        )
        .unwrap();
        assert_eq!(parsed.into_titles(), ["Marie Curie", "Pierre Curie"]);
    }

    #[test]
    fn opensearch_ignores_shape_of_unused_entries() {
        let parsed: OpenSearchResponse =
            serde_json::from_str(r#"[null,["Marie Curie"],[1],{}]"#).unwrap();
        assert_eq!(parsed.into_titles(), ["Marie Curie"]);
    }

    #[test]
    fn summary_without_urls_maps_to_empty_url() {
        let summary: PageSummary =
            serde_json::from_str(r#"{"title":"Rust","extract":"A language."}"#).unwrap();
        let article = Article::from(summary);
        assert_eq!(article.url, "");
        assert_eq!(article.thumbnail, None);
    }

    #[test]
    fn summary_maps_desktop_url_and_thumbnail() {
        let summary: PageSummary = serde_json::from_str(
            r#"{
                "title": "Marie Curie",
                "extract": "Polish and naturalised-French physicist.",
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Marie_Curie"}},
                "thumbnail": {"source": "https://upload.wikimedia.org/curie.jpg", "width": 320}
            }"#,
        )
        .unwrap();
        let article = Article::from(summary);
        assert_eq!(article.url, "https://en.wikipedia.org/wiki/Marie_Curie");
        assert_eq!(
            article.thumbnail.as_deref(),
            Some("https://upload.wikimedia.org/curie.jpg")
        );
    }
}
