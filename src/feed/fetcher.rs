use crate::feed::parser::{parse_feed, RawEntry};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while retrieving a feed.
///
/// Any of these makes the feed contribute zero entries to the current run;
/// other feeds are unaffected.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Limits applied to every feed request.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Per-attempt timeout covering connect and response headers.
    pub timeout: Duration,
    /// Retries after 429, 5xx or truncated bodies.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub base_backoff: Duration,
    pub max_body_bytes: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Source of feed entries, the seam between the pipeline and the network.
///
/// Implementations return entries in the order the feed lists them, which is
/// assumed to be newest first.
pub trait EntrySource {
    fn entries(
        &self,
        feed_url: &str,
    ) -> impl Future<Output = Result<Vec<RawEntry>, FetchError>> + Send;
}

/// Fetches and parses feeds over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    /// Downloads the raw feed document.
    ///
    /// The policy timeout bounds each attempt as a whole, body included, so
    /// a server that sends headers and then stalls cannot hold up a run.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - An attempt exceeded the policy timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx response (5xx only after retries)
    /// - [`FetchError::RateLimited`] - 429 response after max retries
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    /// - [`FetchError::IncompleteResponse`] - Truncated body after max retries
    pub async fn fetch_bytes(&self, feed_url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let attempt = tokio::time::timeout(self.policy.timeout, self.attempt(feed_url))
                .await
                .map_err(|_| FetchError::Timeout(self.policy.timeout))?;

            match attempt {
                Ok(Attempt::Body(bytes)) => return Ok(bytes),
                Ok(Attempt::Busy(status)) => {
                    if retry_count >= self.policy.max_retries {
                        return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                            FetchError::RateLimited(self.policy.max_retries)
                        } else {
                            FetchError::HttpStatus(status.as_u16())
                        });
                    }

                    let delay = self.backoff(retry_count);
                    tracing::warn!(
                        feed = %feed_url,
                        status = %status,
                        retry = retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "Feed server busy, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(FetchError::IncompleteResponse { expected, received })
                    if retry_count < self.policy.max_retries =>
                {
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        feed = %feed_url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request and body read, without retries or deadline.
    async fn attempt(&self, feed_url: &str) -> Result<Attempt, FetchError> {
        let response = self.client.get(feed_url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Ok(Attempt::Busy(status));
        }

        // 4xx errors fail immediately
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.policy.max_body_bytes)
            .await
            .map(Attempt::Body)
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.policy.base_backoff.saturating_mul(1u32 << retry_count.min(16))
    }
}

/// Outcome of a single attempt that is not a hard failure.
enum Attempt {
    Body(Vec<u8>),
    /// 429 or 5xx; worth retrying.
    Busy(reqwest::StatusCode),
}

impl EntrySource for HttpFeedSource {
    async fn entries(&self, feed_url: &str) -> Result<Vec<RawEntry>, FetchError> {
        let bytes = self.fetch_bytes(feed_url).await?;
        let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(feed = %feed_url, entries = entries.len(), "Fetched feed");
        Ok(entries)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Second</title><link>https://example.com/2</link></item>
    <item><title>First</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn fast_source() -> HttpFeedSource {
        HttpFeedSource::new(
            reqwest::Client::new(),
            FetchPolicy {
                timeout: Duration::from_secs(5),
                max_retries: 3,
                base_backoff: Duration::from_millis(10),
                max_body_bytes: 1024 * 1024,
            },
        )
    }

    #[tokio::test]
    async fn test_entries_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let entries = fast_source()
            .entries(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["https://example.com/2", "https://example.com/1"]);
    }

    #[tokio::test]
    async fn test_404_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fast_source().entries(&format!("{}/feed", mock_server.uri())).await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&mock_server)
            .await;

        let result = fast_source().entries(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_503_then_success() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let entries = fast_source()
            .entries(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_429_exhausts_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let result = fast_source().entries(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::RateLimited(3))));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let result = fast_source().entries(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&mock_server)
            .await;

        let source = HttpFeedSource::new(
            reqwest::Client::new(),
            FetchPolicy {
                max_body_bytes: 1024,
                ..FetchPolicy::default()
            },
        );
        let result = source.entries(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let source = HttpFeedSource::new(
            reqwest::Client::new(),
            FetchPolicy {
                timeout: Duration::from_millis(100),
                ..FetchPolicy::default()
            },
        );
        let result = source.entries(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 1000 bytes, sends 4, then goes quiet
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n<rss")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        let source = HttpFeedSource::new(
            reqwest::Client::new(),
            FetchPolicy {
                timeout: Duration::from_millis(200),
                max_retries: 0,
                ..FetchPolicy::default()
            },
        );

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            source.entries(&format!("http://{}/feed", addr)),
        )
        .await
        .expect("feed fetch must not outlive its policy timeout");
        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }

    #[test]
    fn test_backoff_doubles() {
        let source = fast_source();
        assert_eq!(source.backoff(0), Duration::from_millis(10));
        assert_eq!(source.backoff(1), Duration::from_millis(20));
        assert_eq!(source.backoff(3), Duration::from_millis(80));
    }
}
