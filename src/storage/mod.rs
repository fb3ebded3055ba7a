//! Seen-article storage.
//!
//! - `history` - the in-memory per-feed history and its rotation rules
//! - `seen` - JSON persistence of that history between runs

mod history;
mod seen;

pub use history::FeedHistory;
pub use seen::{SeenArticleStore, StoreError};
