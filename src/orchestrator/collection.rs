//! Articles the user has collected during the session.

use chrono::{DateTime, Utc};

use crate::article::Article;
use crate::wikipedia::WikipediaError;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("article title is empty")]
    EmptyTitle,

    #[error("\"{0}\" is already in the collection")]
    AlreadyCollected(String),

    #[error(transparent)]
    Lookup(#[from] WikipediaError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedArticle {
    pub id: u64,
    pub article: Article,
    pub added_at: DateTime<Utc>,
}

/// Insertion-ordered; ids are never reused within a session.
#[derive(Debug, Default)]
pub struct ArticleCollection {
    entries: Vec<CollectedArticle>,
    next_id: u64,
}

impl ArticleCollection {
    pub fn contains_title(&self, title: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.article.title.eq_ignore_ascii_case(title))
    }

    pub fn add(&mut self, article: Article) -> Result<CollectedArticle, CollectError> {
        if self.contains_title(&article.title) {
            return Err(CollectError::AlreadyCollected(article.title));
        }
        self.next_id += 1;
        let entry = CollectedArticle {
            id: self.next_id,
            article,
            added_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn remove(&mut self, id: u64) -> Option<CollectedArticle> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Entries whose title or extract contains `term`, case-insensitively.
    /// A blank term matches everything.
    pub fn filter(&self, term: &str) -> Vec<CollectedArticle> {
        let term = term.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.article.title.to_lowercase().contains(&term)
                    || e.article.extract.to_lowercase().contains(&term)
            })
            .cloned()
            .collect()
    }

    /// Collected articles worth grounding an answer to `question` in.
    ///
    /// An article matches when its title contains the question, or when any word of its
    /// extract longer than three characters appears in the question.
    pub fn relevant(&self, question: &str) -> Vec<Article> {
        let question = question.to_lowercase();
        self.entries
            .iter()
            .map(|e| &e.article)
            .filter(|article| {
                article.title.to_lowercase().contains(&question)
                    || article
                        .extract
                        .to_lowercase()
                        .split(' ')
                        .any(|word| word.chars().count() > 3 && question.contains(word))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curie() -> Article {
        Article::new(
            "Marie Curie",
            "Marie Curie was a physicist and chemist who studied radioactivity in Paris.",
            "https://en.wikipedia.org/wiki/Marie_Curie",
        )
    }

    fn rust() -> Article {
        Article::new("Rust (programming language)", "Rust is a systems language.", "")
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let mut collection = ArticleCollection::default();
        let first = collection.add(curie()).unwrap();
        let second = collection.add(rust()).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(collection.filter("").len(), 2);
    }

    #[test]
    fn add_rejects_same_title() {
        let mut collection = ArticleCollection::default();
        collection.add(curie()).unwrap();
        let err = collection.add(Article::new("marie curie", "", "")).unwrap_err();
        assert!(matches!(err, CollectError::AlreadyCollected(_)));
    }

    #[test]
    fn remove_by_id_keeps_ids_unique() {
        let mut collection = ArticleCollection::default();
        let first = collection.add(curie()).unwrap();
        collection.add(rust()).unwrap();

        let removed = collection.remove(first.id).unwrap();
        assert_eq!(removed.article.title, "Marie Curie");
        assert!(collection.remove(first.id).is_none());

        let again = collection.add(curie()).unwrap();
        assert_eq!(again.id, 3);
    }

    #[test]
    fn filter_matches_title_or_extract() {
        let mut collection = ArticleCollection::default();
        collection.add(curie()).unwrap();
        collection.add(rust()).unwrap();

        let titles = |term: &str| -> Vec<String> {
            collection
                .filter(term)
                .into_iter()
                .map(|e| e.article.title)
                .collect()
        };
        assert_eq!(titles("CURIE"), vec!["Marie Curie"]);
        assert_eq!(titles("systems"), vec!["Rust (programming language)"]);
        assert!(titles("zebra").is_empty());
    }

    #[test]
    fn relevant_by_shared_extract_word() {
        let mut collection = ArticleCollection::default();
        collection.add(curie()).unwrap();
        collection.add(rust()).unwrap();

        let relevant = collection.relevant("What is radioactivity?");
        assert_eq!(relevant, vec![curie()]);
    }

    #[test]
    fn relevant_by_title_containing_question() {
        let mut collection = ArticleCollection::default();
        collection.add(rust()).unwrap();

        assert_eq!(collection.relevant("programming"), vec![rust()]);
    }

    #[test]
    fn short_words_do_not_match() {
        let mut collection = ArticleCollection::default();
        collection.add(Article::new("Cat", "The cat is a pet", "")).unwrap();

        // Every extract word is three characters or fewer.
        assert!(collection.relevant("Is the cat a dog?").is_empty());
    }
}
