//! Error types for stream resolution

/// Result type alias for RTHK stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the resolver, the proxy and the catalog
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel id absent from the catalog
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    /// Neither scraping nor a fallback produced a stream URL
    #[error("No stream URL available for channel '{channel}': {cause}")]
    ResolutionExhausted {
        channel: String,
        cause: ScrapeFailure,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Proxy target rejected before any request was made
    #[error("{0}")]
    InvalidProxyUrl(String),

    /// Upstream stream could not be opened
    #[error("Proxy request failed: {0}")]
    Proxy(String),
}

impl Error {
    /// Create a proxy error
    pub fn proxy(msg: impl Into<String>) -> Self {
        Self::Proxy(msg.into())
    }

    /// True for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ChannelNotFound(_) | Self::InvalidProxyUrl(_))
    }
}

/// Recoverable failure of a live scrape
///
/// Both variants send the resolver to the fallback branch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeFailure {
    /// Timeout, transport error or non-success status
    #[error("source page fetch failed: {0}")]
    SourceFetchFailed(String),

    /// Page fetched but no strategy found a stream URL
    #[error("no stream URL found in source page")]
    NoPatternMatched,
}

impl ScrapeFailure {
    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::SourceFetchFailed(msg.into())
    }
}
