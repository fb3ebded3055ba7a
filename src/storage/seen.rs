use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::history::FeedHistory;

/// Errors that can occur while persisting the seen-article history.
///
/// Loading never fails: a missing or corrupt state file is treated as an
/// empty history.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write state file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize seen-article history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable home of the [`FeedHistory`]: a single JSON file.
///
/// The file is read once when a run starts and fully rewritten once when it
/// ends. Writes go to a sibling temp file that is synced and renamed over the
/// original, so an interrupted save never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct SeenArticleStore {
    path: PathBuf,
}

impl SeenArticleStore {
    /// Maximum state file size read back (16 MB).
    const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the history from disk.
    ///
    /// - Missing file → empty history
    /// - Unreadable, oversized or malformed file → empty history, logged as a warning
    pub fn load(&self) -> FeedHistory {
        match std::fs::metadata(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "No state file found, starting with empty history"
                );
                return FeedHistory::new();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cannot stat state file, starting with empty history"
                );
                return FeedHistory::new();
            }
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                tracing::warn!(
                    path = %self.path.display(),
                    size = meta.len(),
                    max = Self::MAX_FILE_SIZE,
                    "State file too large, starting with empty history"
                );
                return FeedHistory::new();
            }
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read state file, starting with empty history"
                );
                return FeedHistory::new();
            }
        };

        match serde_json::from_str::<FeedHistory>(&content) {
            Ok(history) => {
                tracing::debug!(
                    path = %self.path.display(),
                    feeds = history.feed_count(),
                    "Loaded seen-article history"
                );
                history
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file is corrupt, starting with empty history"
                );
                FeedHistory::new()
            }
        }
    }

    /// Writes the full history, replacing whatever was stored before.
    ///
    /// Missing parent directories are created.
    pub fn save(&self, history: &FeedHistory) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(history)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let temp_path = self.temp_path();
        let write_result = (|| {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            drop(file);

            // rename() fails on Windows when the destination exists
            #[cfg(windows)]
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }

            std::fs::rename(&temp_path, &self.path)
        })();

        if let Err(source) = write_result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(self.io_error(source));
        }

        tracing::debug!(
            path = %self.path.display(),
            feeds = history.feed_count(),
            "Saved seen-article history"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "seen_articles.json".into());
        name.push(format!(".tmp.{}", std::process::id()));
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
