//! The article pipeline: fetch every feed, keep what has not been delivered
//! yet, estimate reading times and update the seen-article history.
//!
//! A poll runs in three phases:
//!
//! 1. **Fetch** all feeds concurrently (bounded, results kept in feed order).
//! 2. **Select** new entries feed by feed against the [`FeedHistory`] and
//!    record them. This phase is pure and sequential; see
//!    [`select_new_entries`].
//! 3. **Enrich** the selected entries into [`Article`]s, which may fetch
//!    article pages for the reading-time fallback (bounded, order kept).
//!
//! [`run`] wraps a poll with loading and saving the history, which happens
//! exactly once per run.

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::content::{estimate_from_html, estimate_from_link, PageFetcher, ReadingTime};
use crate::feed::{EntrySource, RawEntry};
use crate::storage::{FeedHistory, SeenArticleStore, StoreError};
use crate::util::feed_domain;

/// A newly discovered article, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Entry author, or the feed's domain when the feed names none.
    pub author: String,
    pub reading_time: ReadingTime,
    /// Raw, unsanitized inline content; empty when the feed carried none.
    pub content: String,
    pub feed_url: String,
}

/// Limits for one poll.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Entries examined per feed per run, in feed order.
    pub scan_cap: usize,
    /// Identifiers retained per feed in the history.
    pub history_size: usize,
    /// Feeds fetched (and pages scraped) at the same time.
    pub max_concurrent: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            scan_cap: 1,
            history_size: 1,
            max_concurrent: 4,
        }
    }
}

/// Result of one poll across all feeds.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// New articles in feed-list order, then feed order within each feed.
    pub articles: Vec<Article>,
    /// Feeds that could not be fetched or parsed this run.
    pub failed_feeds: Vec<String>,
}

/// Advances one feed's history with freshly fetched entries and returns the
/// entries that were not delivered before.
///
/// Only the first `scan_cap` entries are examined, and the scan stops at the
/// first entry already in the history.
///
/// # Precondition
///
/// `entries` must be ordered newest first and the feed must not insert older
/// entries behind ones it already published. The early stop assumes that
/// everything after a seen entry was seen too; a feed that reorders or
/// backfills has those entries silently skipped.
pub fn select_new_entries(
    history: &mut FeedHistory,
    feed_url: &str,
    entries: Vec<RawEntry>,
    options: &PipelineOptions,
) -> Vec<RawEntry> {
    history.ensure_feed(feed_url);

    let new_entries: Vec<RawEntry> = entries
        .into_iter()
        .take(options.scan_cap)
        .take_while(|entry| history.is_new(feed_url, &entry.id))
        .collect();

    history.record_batch(
        feed_url,
        new_entries.iter().map(|entry| entry.id.clone()),
        options.history_size,
    );

    new_entries
}

/// Turns a selected entry into an [`Article`].
///
/// Inline content (content parts, else the description) feeds the reading
/// time estimate; the linked page is only fetched when there is none.
pub async fn build_article<P: PageFetcher>(feed_url: &str, entry: RawEntry, pages: &P) -> Article {
    let content = entry.inline_content();

    let reading_time = if !content.is_empty() {
        ReadingTime::Minutes(estimate_from_html(&content))
    } else if let Some(link) = entry.link.as_deref() {
        estimate_from_link(pages, link).await
    } else {
        ReadingTime::Unknown
    };

    let author = entry
        .author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| feed_domain(feed_url));

    Article {
        title: entry.title,
        link: entry.link.unwrap_or_default(),
        author,
        reading_time,
        content,
        feed_url: feed_url.to_string(),
    }
}

/// Polls every feed once, updating `history` in memory.
///
/// A feed that fails to fetch contributes no articles and its history is
/// left as it was; the failure is logged and the other feeds proceed. A URL
/// listed twice is polled once.
pub async fn poll_feeds<S, P>(
    history: &mut FeedHistory,
    feed_urls: &[String],
    source: &S,
    pages: &P,
    options: &PipelineOptions,
) -> PollOutcome
where
    S: EntrySource,
    P: PageFetcher,
{
    let concurrency = options.max_concurrent.max(1);

    let mut feeds: Vec<&str> = Vec::with_capacity(feed_urls.len());
    for url in feed_urls {
        if !feeds.contains(&url.as_str()) {
            feeds.push(url.as_str());
        }
    }

    // `buffered` yields in input order regardless of completion order
    let fetched: Vec<(&str, Option<Vec<RawEntry>>)> = stream::iter(feeds)
        .map(|feed_url| async move {
            match source.entries(feed_url).await {
                Ok(entries) => (feed_url, Some(entries)),
                Err(e) => {
                    tracing::warn!(
                        feed = %feed_url,
                        error = %e,
                        "Feed fetch failed, skipping for this run"
                    );
                    (feed_url, None)
                }
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    let mut outcome = PollOutcome::default();
    let mut selected: Vec<(&str, RawEntry)> = Vec::new();

    for (feed_url, entries) in fetched {
        let Some(entries) = entries else {
            history.ensure_feed(feed_url);
            outcome.failed_feeds.push(feed_url.to_string());
            continue;
        };

        let fetched_count = entries.len();
        let new_entries = select_new_entries(history, feed_url, entries, options);
        tracing::info!(
            feed = %feed_url,
            fetched = fetched_count,
            new = new_entries.len(),
            "Scanned feed"
        );
        selected.extend(new_entries.into_iter().map(|entry| (feed_url, entry)));
    }

    outcome.articles = stream::iter(selected)
        .map(|(feed_url, entry)| build_article(feed_url, entry, pages))
        .buffered(concurrency)
        .collect()
        .await;

    outcome
}

/// Runs one complete poll: load the history, poll every feed, save the
/// history once.
///
/// # Errors
///
/// Only persisting the history can fail. Feed and page failures are
/// absorbed by [`poll_feeds`].
pub async fn run<S, P>(
    store: &SeenArticleStore,
    feed_urls: &[String],
    source: &S,
    pages: &P,
    options: &PipelineOptions,
) -> Result<PollOutcome, StoreError>
where
    S: EntrySource,
    P: PageFetcher,
{
    let mut history = store.load();

    let outcome = poll_feeds(&mut history, feed_urls, source, pages, options).await;

    store.save(&history)?;
    tracing::info!(
        feeds = feed_urls.len(),
        failed = outcome.failed_feeds.len(),
        articles = outcome.articles.len(),
        state = %store.path().display(),
        "Poll complete"
    );

    Ok(outcome)
}
