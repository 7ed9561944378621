//! Byte sources for download tasks.
//!
//! [`Fetcher`] is the seam between task execution and the network. The
//! production [`HttpFetcher`] streams response bodies with `reqwest`; tests
//! substitute in-memory fakes.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::config::DownloadConfig;
use crate::error::{Error, Result, TransferError};
use crate::types::Locator;

/// An open response: announced length plus the body as a chunk stream
pub struct FetchResponse {
    /// Length announced by the source (Content-Length), if any
    pub content_length: Option<u64>,
    /// Body chunks in order; an `Err` item ends the transfer
    pub body: BoxStream<'static, std::result::Result<Bytes, TransferError>>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a byte stream for a locator
///
/// Implementations classify failures into [`TransferError`] variants so the
/// retry layer can tell transient faults from permanent ones.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Start fetching `locator`
    async fn fetch(&self, locator: &Locator) -> std::result::Result<FetchResponse, TransferError>;
}

/// Production [`Fetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the configured connect timeout and user agent
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Reject locators that are not absolute http(s) URLs
fn parse_locator(locator: &Locator) -> std::result::Result<url::Url, TransferError> {
    let url = url::Url::parse(&locator.url).map_err(|e| TransferError::InvalidLocator {
        locator: locator.url.clone(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransferError::InvalidLocator {
            locator: locator.url.clone(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &Locator) -> std::result::Result<FetchResponse, TransferError> {
        let url = parse_locator(locator)?;

        let mut request = self.client.get(url);
        for (name, value) in &locator.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransferError::from_request(&locator.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::HttpStatus {
                status: status.as_u16(),
                url: locator.url.clone(),
            });
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransferError::Network(e.to_string())))
            .boxed();

        Ok(FetchResponse {
            content_length,
            body,
        })
    }
}
