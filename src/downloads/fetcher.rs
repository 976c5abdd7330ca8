use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DownloadsConfig;
use crate::utils::{DownloadError, direct_media_url};

/// Response body as an incremental byte stream plus its length and type hints
pub struct FetchResponse {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: BoxStream<'static, anyhow::Result<Bytes>>,
}

impl FetchResponse {
    pub fn new(
        content_length: Option<u64>,
        content_type: Option<String>,
        body: BoxStream<'static, anyhow::Result<Bytes>>,
    ) -> Self {
        Self {
            content_length,
            content_type,
            body,
        }
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Streaming transfer capability. Implementations return once headers are
/// in; the body is consumed chunk by chunk by the caller.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, DownloadError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &DownloadsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, DownloadError> {
        let url = direct_media_url(url);
        info!("Sending HTTP request to: {}", url);

        let send = tokio::time::timeout(self.request_timeout, self.client.get(&url).send());
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            result = send => match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    error!("Failed to send HTTP request: {}", e);
                    return Err(DownloadError::transfer(e));
                }
                Err(_) => {
                    error!(
                        "HTTP request timeout after {} seconds",
                        self.request_timeout.as_secs()
                    );
                    return Err(DownloadError::Transfer("Request timeout".to_string()));
                }
            },
        };

        let status = response.status();
        if !status.is_success() {
            error!("HTTP error response: {}", status);
            return Err(DownloadError::HttpStatus(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default().to_string(),
            ));
        }

        let content_length = response.content_length();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!(
            "Response headers: length {:?}, type {:?}",
            content_length, content_type
        );

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.context("Failed to read chunk from response"))
            .boxed();

        Ok(FetchResponse::new(content_length, content_type, body))
    }
}
