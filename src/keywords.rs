//! Turning a free-form question into Wikipedia search keywords.

use tracing::debug;

use crate::llm::{LanguageModel, LlmError};

/// Output budget for keyword extraction; keywords are a handful of words.
pub const KEYWORD_MAX_TOKENS: u32 = 100;

pub fn keyword_prompt(question: &str) -> String {
    format!(
        "Extract the main search keywords from this question for a Wikipedia search. \
         Return ONLY the keywords, nothing else. Capitalize proper nouns.\n\n\
         Question: \"{question}\"\n\n\
         Keywords:"
    )
}

/// Ask the model for search keywords. Blank model output counts as a failure.
pub async fn extract_keywords(
    llm: &impl LanguageModel,
    question: &str,
) -> Result<String, LlmError> {
    let text = llm.complete(&keyword_prompt(question), KEYWORD_MAX_TOKENS).await?;
    let keywords = text.trim();
    if keywords.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    debug!(question = %question, keywords = %keywords, "keywords extracted");
    Ok(keywords.to_string())
}
