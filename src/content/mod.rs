//! Article content handling.
//!
//! - **Reading time**: word-count estimates from inline text, or from the
//!   linked page when the feed carries no text
//! - **Page fetching**: deadline-bounded retrieval of article pages behind
//!   the [`PageFetcher`] trait
//! - **HTML**: visible-text extraction and allow-list sanitizing for email

mod html;
mod page;
mod reading_time;
mod sanitize;

pub use html::visible_text;
pub use page::{ContentError, HttpPageFetcher, PageFetcher};
pub use reading_time::{
    estimate_from_html, estimate_from_link, estimate_from_text, ReadingTime, WORDS_PER_MINUTE,
};
pub use sanitize::{sanitize_html, SanitizePolicy};
