//! HTTP transport abstraction for testability.
//!
//! The engine never talks to `reqwest` directly. Everything goes through the
//! [`Transport`] trait, which returns the response status plus a stream of
//! body chunks, so downloads can be hashed and written in a single pass.
//! Tests substitute an in-memory transport.
//!
//! The trait uses `Pin<Box<dyn Future>>` for dyn compatibility
//! (`Arc<dyn Transport>` is shared across worker tasks).

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::{SyncError, SyncResult};

/// Default request timeout in seconds. Package archives can be large, so
/// this bounds the whole transfer generously rather than per-read.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Streamed response body: a sequence of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = SyncResult<Bytes>> + Send>>;

/// A fetched response, body not yet consumed.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body chunks, yielded in order.
    pub body: ByteStream,
}

impl FetchResponse {
    /// Whether the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching URLs.
///
/// Implementations must be `Send + Sync`; one transport instance is shared
/// by all download workers.
pub trait Transport: Send + Sync {
    /// Perform an HTTP GET request.
    ///
    /// Returns the status and a body stream. Transport-level failures
    /// (connection, TLS, timeout) surface as [`SyncError::Transport`];
    /// non-success statuses are returned in the response for the caller
    /// to judge.
    fn fetch(&self, url: &str) -> BoxFuture<'_, SyncResult<FetchResponse>>;
}

/// Real transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> SyncResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a transport with a custom whole-request timeout.
    pub fn with_timeout(timeout_secs: u64) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SyncError::Transport {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn fetch(&self, url: &str) -> BoxFuture<'_, SyncResult<FetchResponse>> {
        let url = url.to_string();
        let client = self.client.clone();

        Box::pin(async move {
            let response =
                client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SyncError::Transport {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;

            let status = response.status().as_u16();
            let body: ByteStream = Box::pin(futures::stream::try_unfold(
                (response, url),
                |(mut response, url)| async move {
                    match response.chunk().await {
                        Ok(Some(chunk)) => Ok(Some((chunk, (response, url)))),
                        Ok(None) => Ok(None),
                        Err(e) => Err(SyncError::Transport {
                            url: url.clone(),
                            reason: e.to_string(),
                        }),
                    }
                },
            ));

            Ok(FetchResponse { status, body })
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use futures::TryStreamExt;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    enum MockReply {
        Body(u16, Vec<u8>),
        ConnectionError,
        InterruptedBody(Vec<u8>),
    }

    /// Mock transport for testing: a map of URL to canned response, plus a
    /// request log for asserting fetch counts.
    pub struct MockTransport {
        replies: Mutex<HashMap<String, MockReply>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Serve `body` with status 200 for `url`.
        pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.replies
                .lock()
                .insert(url.to_string(), MockReply::Body(200, body.into()));
            self
        }

        /// Serve an empty body with the given status for `url`.
        pub fn with_status(self, url: &str, status: u16) -> Self {
            self.replies
                .lock()
                .insert(url.to_string(), MockReply::Body(status, Vec::new()));
            self
        }

        /// Fail `url` with a transport error.
        pub fn with_connection_error(self, url: &str) -> Self {
            self.replies
                .lock()
                .insert(url.to_string(), MockReply::ConnectionError);
            self
        }

        /// Serve part of `body` for `url`, then fail mid-stream.
        pub fn with_interrupted_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.replies
                .lock()
                .insert(url.to_string(), MockReply::InterruptedBody(body.into()));
            self
        }

        /// Replace the body served for `url` after construction.
        pub fn set_body(&self, url: &str, body: impl Into<Vec<u8>>) {
            self.replies
                .lock()
                .insert(url.to_string(), MockReply::Body(200, body.into()));
        }

        /// All URLs requested so far, in order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }

        /// How many times `url` has been requested.
        pub fn request_count(&self, url: &str) -> usize {
            self.requests.lock().iter().filter(|r| *r == url).count()
        }
    }

    impl Transport for MockTransport {
        fn fetch(&self, url: &str) -> BoxFuture<'_, SyncResult<FetchResponse>> {
            self.requests.lock().push(url.to_string());

            let reply = match self.replies.lock().get(url) {
                Some(MockReply::Body(status, body)) => Ok((*status, body.clone(), false)),
                Some(MockReply::InterruptedBody(body)) => Ok((200, body.clone(), true)),
                Some(MockReply::ConnectionError) => Err(SyncError::Transport {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
                // Unknown URLs behave like a missing upstream file.
                None => Ok((404, Vec::new(), false)),
            };
            let url = url.to_string();

            Box::pin(async move {
                let (status, body, interrupt) = reply?;
                // Split the body so consumers see more than one chunk.
                let mid = body.len() / 2;
                let mut chunks = vec![
                    Ok(Bytes::copy_from_slice(&body[..mid])),
                    Ok(Bytes::copy_from_slice(&body[mid..])),
                ];
                if interrupt {
                    chunks.push(Err(SyncError::Transport {
                        url,
                        reason: "connection reset mid-stream".to_string(),
                    }));
                }
                let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
                Ok(FetchResponse {
                    status,
                    body: stream,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_mock_transport_success() {
        let mock = MockTransport::new().with_body("http://mirror.test/a", b"hello".to_vec());

        let response = mock.fetch("http://mirror.test/a").await.unwrap();
        assert!(response.is_success());

        let chunks: Vec<Bytes> = response.body.try_collect().await.unwrap();
        let joined: Vec<u8> = chunks.concat();
        assert_eq!(joined, b"hello");
    }

    #[tokio::test]
    async fn test_mock_transport_unknown_url_is_404() {
        let mock = MockTransport::new();
        let response = mock.fetch("http://mirror.test/missing").await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_mock_transport_connection_error() {
        let mock = MockTransport::new().with_connection_error("http://mirror.test/down");
        let result = mock.fetch("http://mirror.test/down").await;
        assert!(matches!(result, Err(SyncError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_mock_transport_records_requests() {
        let mock = MockTransport::new().with_body("http://mirror.test/a", b"x".to_vec());
        let _ = mock.fetch("http://mirror.test/a").await;
        let _ = mock.fetch("http://mirror.test/a").await;
        let _ = mock.fetch("http://mirror.test/b").await;

        assert_eq!(mock.request_count("http://mirror.test/a"), 2);
        assert_eq!(mock.requests().len(), 3);
    }
}
