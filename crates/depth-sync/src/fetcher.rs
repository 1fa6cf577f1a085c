//! REST depth snapshot retrieval

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use depth_types::{DepthError, DepthResult, DepthSnapshot, Symbol};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Source of point-in-time book snapshots
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + 'static {
    /// Fetch up to `limit` levels per side for `symbol`
    async fn fetch(&self, symbol: &Symbol, limit: u32) -> DepthResult<DepthSnapshot>;
}

/// Snapshot fetcher backed by the REST depth endpoint
#[derive(Clone)]
pub struct RestSnapshotFetcher {
    client: Client,
    endpoint: Endpoint,
    timeout: Duration,
}

impl RestSnapshotFetcher {
    /// Create a fetcher for the given endpoint
    pub fn new(endpoint: Endpoint, timeout: Duration) -> DepthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("depth-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DepthError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self::with_client(client, endpoint, timeout))
    }

    /// Create a fetcher around an existing HTTP client
    pub fn with_client(client: Client, endpoint: Endpoint, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }

    /// Endpoint this fetcher talks to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> DepthError {
        if err.is_timeout() {
            DepthError::ConnectionTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            DepthError::RequestFailed {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl SnapshotFetcher for RestSnapshotFetcher {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn fetch(&self, symbol: &Symbol, limit: u32) -> DepthResult<DepthSnapshot> {
        let url = self.endpoint.depth_url();
        debug!(limit, "Fetching depth snapshot");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str().to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        if !status.is_success() {
            return Err(DepthError::Http {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let snapshot =
            DepthSnapshot::parse(&body).map_err(|e| DepthError::invalid_json(&e, Some(&body)))?;
        debug!(
            last_update_id = snapshot.last_update_id,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "Snapshot received"
        );
        Ok(snapshot)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockSnapshotFetcher;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    enum MockResponse {
        Ready(DepthResult<DepthSnapshot>),
        Deferred(oneshot::Receiver<DepthResult<DepthSnapshot>>),
    }

    /// Scripted snapshot fetcher for tests
    ///
    /// Responses are consumed in order. A deferred response completes when the
    /// test sends on the returned channel, which lets a test hold a fetch in
    /// flight while it drives the coordinator.
    #[derive(Default)]
    pub struct MockSnapshotFetcher {
        responses: Mutex<VecDeque<MockResponse>>,
        requests: Mutex<Vec<(Symbol, u32)>>,
    }

    impl MockSnapshotFetcher {
        /// Create a fetcher with no queued responses
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful response
        pub fn push_snapshot(&self, snapshot: DepthSnapshot) {
            self.responses
                .lock()
                .push_back(MockResponse::Ready(Ok(snapshot)));
        }

        /// Queue a failure
        pub fn push_error(&self, error: DepthError) {
            self.responses.lock().push_back(MockResponse::Ready(Err(error)));
        }

        /// Queue a response the test completes later
        pub fn defer(&self) -> oneshot::Sender<DepthResult<DepthSnapshot>> {
            let (tx, rx) = oneshot::channel();
            self.responses.lock().push_back(MockResponse::Deferred(rx));
            tx
        }

        /// Number of fetches performed
        pub fn calls(&self) -> usize {
            self.requests.lock().len()
        }

        /// Every `(symbol, limit)` requested so far
        pub fn requests(&self) -> Vec<(Symbol, u32)> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl SnapshotFetcher for MockSnapshotFetcher {
        async fn fetch(&self, symbol: &Symbol, limit: u32) -> DepthResult<DepthSnapshot> {
            self.requests.lock().push((symbol.clone(), limit));
            let next = self.responses.lock().pop_front();

            match next {
                Some(MockResponse::Ready(result)) => result,
                Some(MockResponse::Deferred(rx)) => rx.await.unwrap_or(Err(DepthError::ChannelClosed)),
                None => Err(DepthError::RequestFailed {
                    url: "mock://depth".into(),
                    reason: "no response queued".into(),
                }),
            }
        }
    }
}
