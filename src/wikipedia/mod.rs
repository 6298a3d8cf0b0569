//! Wikipedia lookup: OpenSearch for candidate titles, then one REST summary per title.

pub mod types;

use futures::future::try_join_all;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::article::Article;
use types::{OpenSearchResponse, PageSummary};

pub const API_BASE: &str = "https://en.wikipedia.org";

/// Same set `encodeURIComponent` leaves alone; `/` in titles like "AC/DC" must be encoded.
const TITLE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, thiserror::Error)]
pub enum WikipediaError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Wikipedia API error: status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct WikipediaClient {
    http: Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search for up to `limit` articles matching `query`.
    ///
    /// Never fails: any error along the way is logged and yields an empty list.
    pub async fn lookup(&self, query: &str, limit: usize) -> Vec<Article> {
        match self.try_lookup(query, limit).await {
            Ok(articles) => {
                info!(query = %query, found = articles.len(), "wikipedia lookup complete");
                articles
            }
            Err(e) => {
                warn!(query = %query, error = %e, "wikipedia lookup failed");
                Vec::new()
            }
        }
    }

    async fn try_lookup(&self, query: &str, limit: usize) -> Result<Vec<Article>, WikipediaError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let titles = self.search_titles(query, limit).await?;
        if titles.is_empty() {
            debug!(query = %query, "no candidate titles");
            return Ok(Vec::new());
        }

        try_join_all(
            titles
                .iter()
                .take(limit)
                .map(|title| self.fetch_summary(title)),
        )
        .await
    }

    pub async fn search_titles(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, WikipediaError> {
        let limit = limit.to_string();
        let url = url::Url::parse_with_params(
            &format!("{}/w/api.php", self.base_url),
            [
                ("action", "opensearch"),
                ("search", query),
                ("limit", limit.as_str()),
                ("namespace", "0"),
                ("format", "json"),
            ],
        )?;

        let response = self.get(url.as_str()).await?;
        let body: OpenSearchResponse = response.json().await?;
        Ok(body.into_titles())
    }

    pub async fn fetch_summary(&self, title: &str) -> Result<Article, WikipediaError> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            utf8_percent_encode(title, TITLE_ENCODE_SET)
        );
        let response = self.get(&url).await.map_err(|e| match e {
            WikipediaError::Status(404) => WikipediaError::NotFound(title.to_string()),
            other => other,
        })?;
        let summary: PageSummary = response.json().await?;
        Ok(summary.into())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, WikipediaError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WikipediaError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_encoding_matches_uri_component() {
        let encode = |s: &str| utf8_percent_encode(s, TITLE_ENCODE_SET).to_string();
        assert_eq!(encode("Marie Curie"), "Marie%20Curie");
        assert_eq!(encode("AC/DC"), "AC%2FDC");
        assert_eq!(encode("C++"), "C%2B%2B");
        assert_eq!(encode("Rust_(programming_language)"), "Rust_(programming_language)");
        assert_eq!(encode("Zürich"), "Z%C3%BCrich");
    }
}
