//! Grounded answer streaming: prompt construction and token → event forwarding.

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{info, warn};

use crate::article::Article;
use crate::event::StreamEvent;
use crate::llm::LanguageModel;

pub const ANSWER_MAX_TOKENS: u32 = 1500;

pub fn build_answer_prompt(question: &str, articles: &[Article]) -> String {
    if articles.is_empty() {
        return format!(
            "I don't have any Wikipedia articles about this topic. Question: {question}\n\n\
             Please provide a brief, helpful answer based on your general knowledge, \
             and mention that this isn't from the stored articles."
        );
    }

    let mut context = String::from("Here are relevant Wikipedia articles:\n\n");
    for article in articles {
        context.push_str(&format!("Article: {}\n", article.title));
        context.push_str(&format!("Content: {}\n", article.extract));
        context.push_str(&format!("Source: {}\n\n", article.url));
    }

    format!(
        "{context}\n\nBased on these Wikipedia articles, please answer this question \
         in a natural, conversational way: {question}\n\n\
         Provide a clear, informative answer and mention which articles you're referencing."
    )
}

/// Stream an answer to `question` grounded in `articles`.
///
/// Yields a `TextDelta` per upstream fragment as soon as it arrives, then exactly one
/// terminal event: `Done` carrying the article count, or `Error`. Nothing follows the
/// terminal event. Dropping the stream drops the upstream connection.
pub fn stream_answer<L>(
    llm: L,
    question: String,
    articles: Vec<Article>,
) -> BoxStream<'static, StreamEvent>
where
    L: LanguageModel + 'static,
{
    let articles_used = articles.len();
    let prompt = build_answer_prompt(&question, &articles);
    info!(question = %question, articles = articles_used, "streaming answer");

    stream::once(async move { llm.stream(&prompt, ANSWER_MAX_TOKENS).await })
        .flat_map(move |opened| match opened {
            Ok(tokens) => tokens
                .map(|token| match token {
                    Ok(text) => StreamEvent::TextDelta { text },
                    Err(e) => StreamEvent::error(e.to_string()),
                })
                .chain(stream::once(future::ready(StreamEvent::Done {
                    articles_used,
                })))
                .boxed(),
            Err(e) => stream::once(future::ready(StreamEvent::error(e.to_string()))).boxed(),
        })
        .scan(false, |ended, event| {
            if *ended {
                return future::ready(None);
            }
            *ended = event.is_terminal();
            future::ready(Some(event))
        })
        .inspect(|event| match event {
            StreamEvent::Done { articles_used } => info!(articles_used, "answer stream complete"),
            StreamEvent::Error { message } => warn!(error = %message, "answer stream failed"),
            StreamEvent::TextDelta { .. } => {}
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedModel;
    use std::sync::Arc;

    fn curie() -> Article {
        Article::new(
            "Marie Curie",
            "Marie Curie was a Polish and naturalised-French physicist and chemist.",
            "https://en.wikipedia.org/wiki/Marie_Curie",
        )
    }

    #[test]
    fn grounded_prompt_lists_each_article() {
        let other = Article::new("Pierre Curie", "French physicist.", "");
        let prompt = build_answer_prompt("Who was Marie Curie?", &[curie(), other]);

        assert!(prompt.starts_with("Here are relevant Wikipedia articles:\n\n"));
        assert!(prompt.contains("Article: Marie Curie\nContent: Marie Curie was"));
        assert!(prompt.contains("Source: https://en.wikipedia.org/wiki/Marie_Curie\n\n"));
        assert!(prompt.contains("Article: Pierre Curie\n"));
        assert!(prompt.contains("conversational way: Who was Marie Curie?"));
        assert!(prompt.contains("mention which articles you're referencing"));
    }

    #[test]
    fn ungrounded_prompt_says_no_articles() {
        let prompt = build_answer_prompt("What is love?", &[]);
        assert!(prompt.starts_with("I don't have any Wikipedia articles"));
        assert!(prompt.contains("Question: What is love?"));
        assert!(prompt.contains("general knowledge"));
    }

    #[tokio::test]
    async fn forwards_deltas_then_done_with_article_count() {
        let model = ScriptedModel::answering(&["Marie Curie ", "was a ", "physicist."]);
        let events: Vec<_> = stream_answer(model, "Who was Marie Curie?".into(), vec![curie()])
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Marie Curie ".into() },
                StreamEvent::TextDelta { text: "was a ".into() },
                StreamEvent::TextDelta { text: "physicist.".into() },
                StreamEvent::Done { articles_used: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn upstream_error_mid_stream_is_terminal() {
        let model = ScriptedModel::answering(&["one ", "two ", "three"]).failing_after(1);
        let events: Vec<_> = stream_answer(model, "q".into(), vec![]).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::TextDelta { text: "one ".into() });
        assert!(matches!(&events[1], StreamEvent::Error { message } if message.contains("ended")));
    }

    #[tokio::test]
    async fn open_failure_yields_single_error() {
        let events: Vec<_> = stream_answer(ScriptedModel::unavailable(), "q".into(), vec![curie()])
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn empty_answer_still_terminates() {
        let events: Vec<_> = stream_answer(ScriptedModel::answering(&[]), "q".into(), vec![])
            .collect()
            .await;
        assert_eq!(events, vec![StreamEvent::Done { articles_used: 0 }]);
    }

    #[tokio::test]
    async fn prompt_sent_upstream_is_grounded() {
        let model = Arc::new(ScriptedModel::answering(&["ok"]));
        let _: Vec<_> = stream_answer(Arc::clone(&model), "Who was Marie Curie?".into(), vec![curie()])
            .collect()
            .await;
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Article: Marie Curie"));
    }
}
