use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-feed history of delivered article identifiers.
///
/// Each feed URL maps to its identifiers ordered most-recent-first. The
/// history is the whole durable state of the application: it is what makes
/// an article "already delivered" across runs.
///
/// Serializes as a plain JSON object, `{ "<feed url>": ["<id>", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedHistory {
    feeds: BTreeMap<String, Vec<String>>,
}

impl FeedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `article_id` has not been recorded for `feed_url`.
    ///
    /// A feed that was never polled has an empty history, so every article
    /// in it is new.
    pub fn is_new(&self, feed_url: &str, article_id: &str) -> bool {
        !self.ids(feed_url).iter().any(|seen| seen == article_id)
    }

    /// Recorded identifiers for a feed, most recent first.
    pub fn ids(&self, feed_url: &str) -> &[String] {
        self.feeds.get(feed_url).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Creates an empty history for `feed_url` if it has none.
    pub fn ensure_feed(&mut self, feed_url: &str) {
        if !self.feeds.contains_key(feed_url) {
            self.feeds.insert(feed_url.to_string(), Vec::new());
        }
    }

    /// Records a batch of newly delivered identifiers and rotates the feed's
    /// history down to `max_len` entries.
    ///
    /// `new_ids` must be ordered most-recent-first, the order the feed
    /// emitted them. The batch is placed ahead of the existing identifiers and
    /// the result is cut to the first `max_len`, so the oldest identifiers
    /// are evicted first. There is no age-based expiry.
    pub fn record_batch<I>(&mut self, feed_url: &str, new_ids: I, max_len: usize)
    where
        I: IntoIterator<Item = String>,
    {
        let history = self.feeds.entry(feed_url.to_string()).or_default();

        let mut rotated: Vec<String> = new_ids.into_iter().collect();
        rotated.extend(history.drain(..));
        rotated.truncate(max_len);

        tracing::trace!(
            feed = %feed_url,
            retained = rotated.len(),
            max_len,
            "Rotated feed history"
        );
        *history = rotated;
    }

    /// Number of feeds with a history entry.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for FeedHistory {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self {
            feeds: iter.into_iter().collect(),
        }
    }
}
