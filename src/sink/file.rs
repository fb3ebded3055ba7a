use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{format_plain, DispatchError, Sink};
use crate::pipeline::Article;

/// Appends articles to a plain-text log. The file is created on first use
/// and never truncated.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for FileSink {
    async fn deliver(&self, article: &Article) -> Result<(), DispatchError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(format_plain(article).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::article;

    #[tokio::test]
    async fn test_appends_each_article() {
        let dir = std::env::temp_dir().join("feedcourier_file_sink_append");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("articles.txt");
        std::fs::write(&path, "existing line\n").unwrap();

        let sink = FileSink::new(&path);
        sink.deliver(&article("First")).await.unwrap();
        sink.deliver(&article("Second")).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("existing line\nTitle: First\n"));
        assert_eq!(text.matches(&"-".repeat(40)).count(), 2);
        assert!(text.find("Title: First").unwrap() < text.find("Title: Second").unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let path = std::env::temp_dir()
            .join("feedcourier_file_sink_missing")
            .join("no")
            .join("such")
            .join("articles.txt");

        let result = FileSink::new(path).deliver(&article("x")).await;
        assert!(matches!(result, Err(DispatchError::Io(_))));
    }
}
