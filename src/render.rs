//! Plain-text and Markdown output for the terminal client.

use crate::article::Article;
use crate::orchestrator::CollectedArticle;

/// Escape characters that break Markdown link syntax: `[`, `]`, `(`, `)`.
pub(crate) fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '[' | ']' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Markdown list of the articles an answer was grounded in. Empty when there are none.
pub fn sources(articles: &[Article]) -> String {
    if articles.is_empty() {
        return String::new();
    }
    let mut out = String::from("Sources:\n");
    for article in articles {
        if article.url.is_empty() {
            out.push_str(&format!("- {}\n", escape_md_link(&article.title)));
        } else {
            out.push_str(&format!(
                "- [{}]({})\n",
                escape_md_link(&article.title),
                article.url
            ));
        }
    }
    out
}

/// Numbered listing of collected articles, one per line.
pub fn collection(entries: &[CollectedArticle]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{:>3}. {} (added {})",
            entry.id,
            entry.article.title,
            entry.added_at.format("%Y-%m-%d %H:%M UTC")
        ));
        if !entry.article.url.is_empty() {
            out.push_str(&format!(" <{}>", entry.article.url));
        }
        out.push('\n');
    }
    out
}

/// One looked-up article: heading, link, then the summary.
pub fn article(article: &Article) -> String {
    let title: String = article
        .title
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let mut out = format!("## {title}\n");
    if !article.url.is_empty() {
        out.push_str(&format!("<{}>\n", article.url));
    }
    if !article.extract.is_empty() {
        out.push('\n');
        out.push_str(article.extract.trim());
        out.push('\n');
    }
    out
}
