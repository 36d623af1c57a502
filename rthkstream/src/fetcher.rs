//! Source page retrieval
//!
//! The resolver only sees the [`PageFetcher`] trait; [`HttpPageFetcher`] is
//! the production implementation over `reqwest`.

use crate::error::{Error, Result, ScrapeFailure};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default timeout for source page requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Browser User-Agent sent with every source page request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A fetched source page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePage {
    /// URL the markup was served from, after redirects
    pub url: Url,
    pub markup: String,
}

/// Retrieves the markup of a source page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns the response body with its final URL
    ///
    /// Timeouts, transport errors and non-success statuses are reported as
    /// [`ScrapeFailure::SourceFetchFailed`].
    async fn fetch_page(&self, url: &Url) -> std::result::Result<SourcePage, ScrapeFailure>;
}

/// `reqwest`-backed page fetcher
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    /// Fetcher with default timeout and User-Agent
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &Url) -> std::result::Result<SourcePage, ScrapeFailure> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ScrapeFailure::fetch_failed(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeFailure::fetch_failed(format!(
                "{} returned {}",
                url, status
            )));
        }

        let final_url = response.url().clone();
        let markup = response
            .text()
            .await
            .map_err(|e| ScrapeFailure::fetch_failed(describe_request_error(&e)))?;

        Ok(SourcePage {
            url: final_url,
            markup,
        })
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        e.to_string()
    }
}

/// Builder for [`HttpPageFetcher`]
#[derive(Debug)]
pub struct FetcherBuilder {
    client: Option<Client>,
    timeout: Duration,
    user_agent: String,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self {
            client: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing HTTP client (its own User-Agent applies)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<HttpPageFetcher> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()
                .map_err(Error::from)?,
        };

        Ok(HttpPageFetcher {
            client,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/radio/radio1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let page = fetcher.fetch_page(&url(&server, "/radio/radio1")).await.unwrap();
        assert_eq!(page.markup, "<html>ok</html>");
        assert_eq!(page.url, url(&server, "/radio/radio1"));

        let requests = server.received_requests().await.unwrap();
        let user_agent = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok());
        assert_eq!(user_agent, Some(DEFAULT_USER_AGENT));
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let err = fetcher.fetch_page(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, ScrapeFailure::SourceFetchFailed(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_timeout_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let err = fetcher.fetch_page(&url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, ScrapeFailure::SourceFetchFailed(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_redirect_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/radio/radio1"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/live/radio1/player.html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/live/radio1/player.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>player</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let page = fetcher.fetch_page(&url(&server, "/radio/radio1")).await.unwrap();
        assert_eq!(page.markup, "<html>player</html>");
        assert_eq!(page.url, url(&server, "/live/radio1/player.html"));
    }

    #[test]
    fn test_builder_defaults() {
        let fetcher = HttpPageFetcher::new().unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(10));
    }
}
