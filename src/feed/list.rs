use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::validate_feed_url;

#[derive(Debug, Error)]
pub enum FeedListError {
    #[error("Failed to read feed list '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads the feed list: one URL per line.
///
/// Blank lines and `#` comments are ignored. Lines that are not http(s) URLs
/// are skipped with a warning, and a URL listed twice is kept only at its
/// first position so that no feed is polled twice in one run.
pub fn load_feed_list(path: &Path) -> Result<Vec<String>, FeedListError> {
    let content = std::fs::read_to_string(path).map_err(|source| FeedListError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let feeds = parse_feed_list(&content);
    tracing::info!(path = %path.display(), feeds = feeds.len(), "Loaded feed list");
    Ok(feeds)
}

/// Parses feed list text; see [`load_feed_list`].
pub fn parse_feed_list(content: &str) -> Vec<String> {
    let mut feeds: Vec<String> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = validate_feed_url(line) {
            tracing::warn!(line = index + 1, url = %line, error = %e, "Skipping invalid feed URL");
            continue;
        }

        if feeds.iter().any(|f| f == line) {
            tracing::warn!(line = index + 1, url = %line, "Skipping duplicate feed URL");
            continue;
        }

        feeds.push(line.to_string());
    }

    feeds
}
