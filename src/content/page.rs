use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::util::validate_feed_url;

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid URL")]
    InvalidUrl,
}

/// Retrieves the markup of an article page.
pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<String, ContentError>> + Send;
}

/// Fetches article pages over HTTP with a hard deadline.
///
/// The deadline covers the whole exchange, body included, so a server that
/// trickles bytes cannot stall a run.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpPageFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            max_bytes: MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, ContentError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        read_limited_text(response, self.max_bytes).await
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, ContentError> {
        let url = validate_feed_url(url).map_err(|_| ContentError::InvalidUrl)?;

        tokio::time::timeout(self.timeout, self.fetch(url.as_str()))
            .await
            .map_err(|_| ContentError::Timeout(self.timeout))?
    }
}

/// Reads a response body up to `limit` bytes. Invalid UTF-8 is replaced
/// rather than rejected: the text is only used for counting words.
async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ContentError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(reqwest::Client::new(), HttpPageFetcher::DEFAULT_TIMEOUT)
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Article body</p>"))
            .mount(&mock_server)
            .await;

        let body = fetcher()
            .fetch_page(&format!("{}/article", mock_server.uri()))
            .await
            .unwrap();
        assert!(body.contains("Article body"));
    }

    #[tokio::test]
    async fn test_http_404() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = fetcher().fetch_page(&format!("{}/gone", mock_server.uri())).await;
        assert!(matches!(result, Err(ContentError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_non_http_url_rejected() {
        let result = fetcher().fetch_page("mailto:someone@example.com").await;
        assert!(matches!(result, Err(ContentError::InvalidUrl)));

        let result = fetcher().fetch_page("not-a-valid-url").await;
        assert!(matches!(result, Err(ContentError::InvalidUrl)));
    }

    #[tokio::test]
    async fn test_deadline_applies() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpPageFetcher::new(reqwest::Client::new(), Duration::from_millis(100));
        let result = fetcher.fetch_page(&format!("{}/slow", mock_server.uri())).await;
        assert!(matches!(result, Err(ContentError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("word ".repeat(1000)))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher().with_max_bytes(100);
        let result = fetcher.fetch_page(&format!("{}/big", mock_server.uri())).await;
        assert!(matches!(result, Err(ContentError::ResponseTooLarge(100))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![b'o', b'k', 0xff, b' ', b'x']),
            )
            .mount(&mock_server)
            .await;

        let body = fetcher()
            .fetch_page(&format!("{}/bytes", mock_server.uri()))
            .await
            .unwrap();
        assert!(body.starts_with("ok"));
        assert!(body.ends_with(" x"));
    }
}
