//! Feed retrieval and parsing.
//!
//! - **Parsing**: RSS/Atom bytes into ordered [`RawEntry`] values via `feed-rs`
//! - **Fetching**: HTTP retrieval with timeout, retry and size limits behind
//!   the [`EntrySource`] trait
//! - **Feed list**: the line-oriented file naming the feeds to poll
//!
//! # Example
//!
//! ```ignore
//! use feedcourier::feed::{load_feed_list, EntrySource, FetchPolicy, HttpFeedSource};
//!
//! let feeds = load_feed_list(Path::new("feeds.txt"))?;
//! let source = HttpFeedSource::new(reqwest::Client::new(), FetchPolicy::default());
//! let entries = source.entries(&feeds[0]).await?;
//! ```

mod fetcher;
mod list;
mod parser;

pub use fetcher::{EntrySource, FetchError, FetchPolicy, HttpFeedSource};
pub use list::{load_feed_list, parse_feed_list, FeedListError};
pub use parser::{parse_feed, RawEntry};
