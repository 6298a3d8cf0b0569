//! Drives one question through keyword extraction, article lookup and answer streaming.
//!
//! Articles the user collected during the session that look relevant to the question are
//! grounded in alongside the search results.
//!
//! ```text
//! Idle -> Extracting -> Searching -> Streaming -> Done
//!                           |             |
//!                           +-> Done      +-> Errored
//! ```

pub mod collection;
pub mod message;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::event::StreamEvent;
use crate::wikipedia::{WikipediaClient, WikipediaError};

pub use collection::{ArticleCollection, CollectError, CollectedArticle};
pub use message::{ConversationMessage, Role};

pub const DEFAULT_ARTICLE_LIMIT: usize = 3;

pub const NO_ARTICLES_MESSAGE: &str = "I couldn't find any Wikipedia articles related to your \
                                       question. Try rephrasing it or asking about a different topic.";

/// Turns a question into search keywords. Never fails; falls back to the question.
pub trait KeywordExtractor {
    async fn extract_keywords(&self, question: &str) -> String;
}

/// Finds articles for a keyword query. An empty list covers both "nothing found" and failure.
pub trait ArticleLookup {
    async fn lookup(&self, query: &str, limit: usize) -> Vec<Article>;

    /// The article with exactly this title.
    async fn fetch_article(&self, title: &str) -> Result<Article, WikipediaError>;
}

/// Streams a grounded answer, ending with exactly one terminal event.
pub trait AnswerSource {
    async fn stream_answer(
        &self,
        question: &str,
        articles: &[Article],
    ) -> BoxStream<'static, StreamEvent>;
}

impl ArticleLookup for WikipediaClient {
    async fn lookup(&self, query: &str, limit: usize) -> Vec<Article> {
        WikipediaClient::lookup(self, query, limit).await
    }

    async fn fetch_article(&self, title: &str) -> Result<Article, WikipediaError> {
        self.fetch_summary(title).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Extracting,
    Searching,
    Streaming,
    Done,
    Errored,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AskError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("another question is still being answered")]
    Busy,
}

#[derive(Debug, Default)]
struct Session {
    phase: Phase,
    messages: Vec<ConversationMessage>,
    collection: ArticleCollection,
}

pub struct Orchestrator<K, A, S> {
    keywords: K,
    articles: A,
    answers: S,
    limit: usize,
    busy: AtomicBool,
    session: Mutex<Session>,
}

impl<K, A, S> Orchestrator<K, A, S>
where
    K: KeywordExtractor,
    A: ArticleLookup,
    S: AnswerSource,
{
    pub fn new(keywords: K, articles: A, answers: S) -> Self {
        Self {
            keywords,
            articles,
            answers,
            limit: DEFAULT_ARTICLE_LIMIT,
            busy: AtomicBool::new(false),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn phase(&self) -> Phase {
        self.session().phase
    }

    /// Snapshot of the conversation so far, including a reply still being streamed.
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.session().messages.clone()
    }

    /// Fetch the article titled `title` and add it to the session's collection.
    pub async fn add_article(&self, title: &str) -> Result<CollectedArticle, CollectError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CollectError::EmptyTitle);
        }
        if self.session().collection.contains_title(title) {
            return Err(CollectError::AlreadyCollected(title.to_string()));
        }
        let article = self.articles.fetch_article(title).await?;
        let entry = self.session().collection.add(article)?;
        info!(id = entry.id, title = %entry.article.title, "article collected");
        Ok(entry)
    }

    pub fn remove_article(&self, id: u64) -> Option<CollectedArticle> {
        let removed = self.session().collection.remove(id);
        if let Some(entry) = &removed {
            info!(id, title = %entry.article.title, "article removed");
        }
        removed
    }

    /// Collected articles matching `filter`; everything when it is blank.
    pub fn collected(&self, filter: &str) -> Vec<CollectedArticle> {
        self.session().collection.filter(filter)
    }

    /// Answer `question`, calling `on_text` with each fragment as it is appended.
    ///
    /// Returns the final assistant reply, or the `error` message when streaming failed.
    pub async fn ask(
        &self,
        question: &str,
        mut on_text: impl FnMut(&str),
    ) -> Result<ConversationMessage, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        let _busy = BusyGuard::acquire(&self.busy).ok_or(AskError::Busy)?;

        {
            let mut session = self.session();
            session.messages.push(ConversationMessage::user(question));
            session.phase = Phase::Extracting;
        }
        debug!(question = %question, "extracting keywords");
        let keywords = self.keywords.extract_keywords(question).await;

        let collected = {
            let mut session = self.session();
            session.phase = Phase::Searching;
            session.collection.relevant(question)
        };
        debug!(
            keywords = %keywords,
            limit = self.limit,
            collected = collected.len(),
            "searching articles"
        );
        let found = self.articles.lookup(&keywords, self.limit).await;
        let articles = merge_articles(collected, found);

        if articles.is_empty() {
            info!(keywords = %keywords, "no articles found");
            let reply = ConversationMessage::assistant(NO_ARTICLES_MESSAGE);
            let mut session = self.session();
            session.messages.push(reply.clone());
            session.phase = Phase::Done;
            return Ok(reply);
        }

        let index = {
            let mut session = self.session();
            session.phase = Phase::Streaming;
            session
                .messages
                .push(ConversationMessage::pending_answer(articles.clone()));
            session.messages.len() - 1
        };

        let mut events = self.answers.stream_answer(question, &articles).await;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    self.session().messages[index].content.push_str(&text);
                    on_text(&text);
                }
                StreamEvent::Done { articles_used } => {
                    info!(articles_used, "answer complete");
                    return Ok(self.finish(index));
                }
                StreamEvent::Error { message } => return Ok(self.fail(index, &message)),
            }
        }
        Ok(self.fail(index, "answer stream ended unexpectedly"))
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, index: usize) -> ConversationMessage {
        let mut session = self.session();
        session.phase = Phase::Done;
        let reply = &mut session.messages[index];
        reply.streaming = false;
        reply.clone()
    }

    /// Finalize whatever was streamed and append an error message.
    fn fail(&self, index: usize, message: &str) -> ConversationMessage {
        warn!(error = %message, "answer failed");
        let mut session = self.session();
        session.phase = Phase::Errored;
        if session.messages[index].content.is_empty() {
            session.messages.remove(index);
        } else {
            session.messages[index].streaming = false;
        }
        let error = ConversationMessage::error(format!(
            "Sorry, I encountered an error processing your request: {message}"
        ));
        session.messages.push(error.clone());
        error
    }
}

/// Collected articles first, then search results not already among them.
fn merge_articles(mut collected: Vec<Article>, found: Vec<Article>) -> Vec<Article> {
    for article in found {
        if !collected
            .iter()
            .any(|c| c.title.eq_ignore_ascii_case(&article.title))
        {
            collected.push(article);
        }
    }
    collected
}

/// Holds the busy flag for the duration of one `ask`.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::relay_client::RelayClient;
    use crate::server::http_tests::{mount_answer, mount_keywords, spawn_relay};
    use crate::wikipedia::http_tests::{mount_search, mount_summary};
    use reqwest::Client;
    use wiremock::MockServer;

    #[tokio::test]
    async fn marie_curie_end_to_end() {
        let llm = MockServer::start().await;
        mount_keywords(&llm, "Marie Curie").await;
        mount_answer(&llm, &["Marie Curie was ", "a physicist and chemist."]).await;
        let relay = RelayClient::new(Client::new(), &spawn_relay(&llm.uri(), None).await);

        let wiki = MockServer::start().await;
        mount_search(&wiki, "Marie Curie", &["Marie Curie"]).await;
        mount_summary(&wiki, "Marie Curie", "Polish and naturalised-French physicist.").await;
        let wikipedia = WikipediaClient::new(Client::new(), &wiki.uri());

        let orchestrator = Orchestrator::new(relay.clone(), wikipedia, relay);
        let reply = orchestrator.ask("Who was Marie Curie?", |_| {}).await.unwrap();

        assert_eq!(orchestrator.phase(), Phase::Done);
        assert_eq!(reply.content, "Marie Curie was a physicist and chemist.");
        let sources = reply.sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Marie Curie");
    }

    #[tokio::test]
    async fn relay_down_still_searches_then_errors() {
        let relay = RelayClient::new(Client::new(), "http://127.0.0.1:9");

        let wiki = MockServer::start().await;
        mount_search(&wiki, "Who was Marie Curie?", &["Marie Curie"]).await;
        mount_summary(&wiki, "Marie Curie", "Physicist.").await;
        let wikipedia = WikipediaClient::new(Client::new(), &wiki.uri());

        let orchestrator = Orchestrator::new(relay.clone(), wikipedia, relay);
        let reply = orchestrator.ask("Who was Marie Curie?", |_| {}).await.unwrap();

        assert_eq!(reply.role, Role::Error);
        assert_eq!(orchestrator.phase(), Phase::Errored);
    }

    #[tokio::test]
    async fn add_article_fetches_summary_by_title() {
        let relay = RelayClient::new(Client::new(), "http://127.0.0.1:9");
        let wiki = MockServer::start().await;
        mount_summary(&wiki, "Marie Curie", "Physicist.").await;
        let wikipedia = WikipediaClient::new(Client::new(), &wiki.uri());
        let orchestrator = Orchestrator::new(relay.clone(), wikipedia, relay);

        let entry = orchestrator.add_article("Marie Curie").await.unwrap();
        assert_eq!(entry.article.extract, "Physicist.");
        assert_eq!(entry.article.url, "https://en.wikipedia.org/wiki/Marie_Curie");

        assert!(matches!(
            orchestrator.add_article("Missing Page").await,
            Err(CollectError::Lookup(WikipediaError::NotFound(_)))
        ));
    }
}
