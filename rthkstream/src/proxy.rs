//! Byte-for-byte stream passthrough
//!
//! The upstream body is a live stream with no end, so only the wait for the
//! response headers is bounded; the body is relayed for as long as the client
//! stays connected.

use crate::error::{Error, Result};
use crate::fetcher::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Opened upstream stream
#[derive(Debug)]
pub struct ProxiedStream {
    content_type: Option<String>,
    response: reqwest::Response,
}

impl ProxiedStream {
    /// Upstream `Content-Type`, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Body chunks as they arrive
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        self.response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
    }
}

/// Opens arbitrary http(s) URLs for relaying
#[derive(Debug, Clone)]
pub struct StreamProxy {
    client: Client,
    header_timeout: Duration,
}

impl StreamProxy {
    /// Proxy with the default User-Agent and a 10 s header timeout
    pub fn new() -> Result<Self> {
        Self::with_settings(
            DEFAULT_USER_AGENT,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_settings(user_agent: &str, header_timeout: Duration) -> Result<Self> {
        // no client-wide timeout: it would also cut the body
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            header_timeout,
        })
    }

    /// Checks that `url` is an absolute http(s) URL
    pub fn validate(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(Error::InvalidProxyUrl("URL parameter is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidProxyUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Sends the upstream request and waits for a successful status
    pub async fn open(&self, url: &str) -> Result<ProxiedStream> {
        Self::validate(url)?;
        debug!(url, "Opening proxied stream");

        let response = tokio::time::timeout(self.header_timeout, self.client.get(url).send())
            .await
            .map_err(|_| {
                Error::proxy(format!(
                    "no response from upstream within {:?}",
                    self.header_timeout
                ))
            })??;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::proxy(format!("upstream returned {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ProxiedStream {
            content_type,
            response,
        })
    }
}
