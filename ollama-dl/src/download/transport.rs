//! Blob transport abstraction.
//!
//! The transfer unit only needs "GET this URL from byte N" and a stream of
//! body chunks. Keeping that behind [`BlobTransport`] lets the engine run
//! against an in-memory double in tests and keeps HTTP client configuration
//! out of the core.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::RANGE;
use reqwest::Client;

use crate::error::{TransferError, TransferResult};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream of response body chunks.
pub type BodyStream = BoxStream<'static, TransferResult<Bytes>>;

/// HTTP status for a full response body.
pub const STATUS_OK: u16 = 200;

/// HTTP status for a ranged response body.
pub const STATUS_PARTIAL_CONTENT: u16 = 206;

/// Response headers and body of one fetch.
pub struct BlobResponse {
    pub status: u16,
    pub body: BodyStream,
}

impl std::fmt::Debug for BlobResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Source of blob bytes.
///
/// Implementations must be safe for concurrent use by many transfer units.
pub trait BlobTransport: Send + Sync {
    /// Fetch `url` starting at byte `offset`.
    ///
    /// `offset == 0` requests the full body with no Range header; otherwise
    /// the request carries `Range: bytes={offset}-`.
    fn fetch<'a>(&'a self, url: &'a str, offset: u64)
        -> BoxFuture<'a, TransferResult<BlobResponse>>;
}

/// Default connect timeout for the HTTP transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`BlobTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with default client settings.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with a custom connect timeout.
    ///
    /// No whole-request timeout is set on the client: blobs can be many
    /// gigabytes. The transfer unit bounds each wait instead.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("ollama-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> TransferError {
    TransferError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

impl BlobTransport for ReqwestTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        offset: u64,
    ) -> BoxFuture<'a, TransferResult<BlobResponse>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            if offset > 0 {
                request = request.header(RANGE, format!("bytes={}-", offset));
            }

            let response = request
                .send()
                .await
                .map_err(|e| map_reqwest_error(url, e))?;
            let status = response.status().as_u16();

            let owned_url = url.to_string();
            let body = stream::unfold(Some(response), move |state| {
                let url = owned_url.clone();
                async move {
                    let mut response = state?;
                    match response.chunk().await {
                        Ok(Some(chunk)) => Some((Ok(chunk), Some(response))),
                        Ok(None) => None,
                        Err(e) => Some((Err(map_reqwest_error(&url, e)), None)),
                    }
                }
            })
            .boxed();

            Ok(BlobResponse { status, body })
        })
    }
}
