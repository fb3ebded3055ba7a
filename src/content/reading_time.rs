use serde::Serialize;
use std::fmt;

use super::html::visible_text;
use super::page::PageFetcher;

/// Average adult reading speed used for every estimate.
pub const WORDS_PER_MINUTE: usize = 200;

/// Estimated reading time of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadingTime {
    Minutes(u32),
    /// The article had no inline text and its page could not be retrieved.
    Unknown,
}

impl fmt::Display for ReadingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingTime::Minutes(minutes) => write!(f, "{}", minutes),
            ReadingTime::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Minutes needed to read `text` at [`WORDS_PER_MINUTE`].
///
/// Rounds to the nearest minute with ties rounded up: 100 words is 1 minute,
/// 300 words is 2, 500 words is 3. An empty text is 0.
pub fn estimate_from_text(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    let minutes = (words + WORDS_PER_MINUTE / 2) / WORDS_PER_MINUTE;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Like [`estimate_from_text`], counting only the visible text of markup.
pub fn estimate_from_html(markup: &str) -> u32 {
    estimate_from_text(&visible_text(markup))
}

/// Estimates reading time by downloading the article page.
///
/// Failures are not errors here: a page that cannot be fetched yields
/// [`ReadingTime::Unknown`].
pub async fn estimate_from_link<P: PageFetcher>(pages: &P, url: &str) -> ReadingTime {
    match pages.fetch_page(url).await {
        Ok(markup) => ReadingTime::Minutes(estimate_from_html(&markup)),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Reading time unavailable, page fetch failed");
            ReadingTime::Unknown
        }
    }
}
