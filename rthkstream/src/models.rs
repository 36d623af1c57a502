//! Data models shared by the resolver, the catalog and the HTTP API

use serde::{Deserialize, Serialize};
use url::Url;

/// File extension of an HLS playlist
pub const MANIFEST_EXTENSION: &str = ".m3u8";

// ============================================================================
// Channels
// ============================================================================

/// Bilingual display name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct LocalizedName {
    pub en: String,
    pub zh: String,
}

impl LocalizedName {
    pub fn new(en: impl Into<String>, zh: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            zh: zh.into(),
        }
    }
}

/// Static description of a channel and where to look for its stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Stable identifier (e.g., "radio1")
    pub id: String,
    pub name: LocalizedName,
    /// Page believed to embed the live manifest URL
    pub source_page: String,
    /// Known-good stream used when scraping fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_stream_url: Option<String>,
}

impl ChannelConfig {
    pub fn new(
        id: impl Into<String>,
        name: LocalizedName,
        source_page: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name,
            source_page: source_page.into(),
            fallback_stream_url: None,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_stream_url = Some(url.into());
        self
    }

    /// Public projection returned by the channel list
    pub fn summary(&self) -> ChannelSummary {
        ChannelSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Channel as exposed to clients (no source page, no fallback)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ChannelSummary {
    pub id: String,
    pub name: LocalizedName,
}

// ============================================================================
// Streams
// ============================================================================

/// How a player should open the stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub enum StreamType {
    /// Segmented HLS playlist
    Hls,
    /// Plain progressive HTTP stream
    Http,
}

impl StreamType {
    /// Classifies a stream URL
    ///
    /// `Hls` when the URL path ends with `.m3u8`, `Http` otherwise. Strings
    /// that do not parse as URLs are checked for the extension anywhere.
    pub fn from_url(url: &str) -> Self {
        let is_manifest = match Url::parse(url) {
            Ok(parsed) => parsed
                .path()
                .to_ascii_lowercase()
                .ends_with(MANIFEST_EXTENSION),
            Err(_) => url.to_ascii_lowercase().contains(MANIFEST_EXTENSION),
        };

        if is_manifest {
            Self::Hls
        } else {
            Self::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hls => "hls",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable stream location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct StreamInfo {
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub url: String,
}

impl StreamInfo {
    /// Builds a stream descriptor, deriving the type from the URL
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            stream_type: StreamType::from_url(&url),
            url,
        }
    }

    pub fn is_hls(&self) -> bool {
        self.stream_type == StreamType::Hls
    }
}
