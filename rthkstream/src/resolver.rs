//! Stream URL resolution
//!
//! [`StreamResolver::resolve`] tries, in strict order:
//!
//! 1. a valid cache entry for the channel (no network activity)
//! 2. a live scrape of the channel's source page
//! 3. the channel's fallback URL, cached with the shorter fallback TTL
//!
//! and fails with [`Error::ResolutionExhausted`] only when all three come up
//! empty. Scrape failures are logged and absorbed.
//!
//! Concurrent misses for the same channel are serialized on a per-channel
//! gate; whoever waited re-checks the cache first, so a burst of requests
//! costs a single scrape. Different channels never wait on each other.

use crate::cache::{CacheEntry, CachePolicy, EntryOrigin, StreamCache};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result, ScrapeFailure};
use crate::fetcher::{HttpPageFetcher, PageFetcher};
use crate::models::{ChannelConfig, StreamInfo};
use crate::scrape::extract_stream_url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use url::Url;

/// Which step produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    Cache,
    Scraped,
    Fallback,
}

/// A resolved stream and the step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub info: StreamInfo,
    pub source: ResolutionSource,
}

/// Read-only view of a cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub stream_info: StreamInfo,
    pub origin: EntryOrigin,
    pub fetched_at: SystemTime,
    /// `None` for an expiry too far away to represent
    pub expires_at: Option<SystemTime>,
    pub is_valid: bool,
}

/// Resolves channels to playable stream URLs, with caching
pub struct StreamResolver {
    fetcher: Arc<dyn PageFetcher>,
    cache: StreamCache,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for StreamResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResolver")
            .field("policy", &self.policy)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl StreamResolver {
    /// Resolver over the real network and wall clock, default TTLs
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Resolves `channel` to a stream URL
    pub async fn resolve(&self, channel: &ChannelConfig) -> Result<StreamInfo> {
        self.resolve_detailed(channel).await.map(|r| r.info)
    }

    /// Like [`resolve`](Self::resolve), also reporting which step answered
    pub async fn resolve_detailed(&self, channel: &ChannelConfig) -> Result<Resolution> {
        if let Some(entry) = self.valid_entry(&channel.id) {
            debug!(channel = %channel.id, "Returning cached stream");
            return Ok(Resolution {
                info: entry.stream_info,
                source: ResolutionSource::Cache,
            });
        }

        let gate = self.gate(&channel.id);
        let _guard = gate.lock().await;

        // Another task may have resolved while we waited
        if let Some(entry) = self.valid_entry(&channel.id) {
            debug!(channel = %channel.id, "Stream resolved by a concurrent request");
            return Ok(Resolution {
                info: entry.stream_info,
                source: ResolutionSource::Cache,
            });
        }

        match self.scrape(channel).await {
            Ok(info) => {
                info!(channel = %channel.id, url = %info.url, "Resolved stream");
                self.store(&channel.id, info.clone(), EntryOrigin::Scraped);
                Ok(Resolution {
                    info,
                    source: ResolutionSource::Scraped,
                })
            }
            Err(failure) => {
                warn!(channel = %channel.id, "Failed to resolve stream: {}", failure);
                self.fallback(channel, failure)
            }
        }
    }

    /// Snapshot of the cache entry for `id`, if any
    pub fn cache_entry(&self, id: &str) -> Option<CacheSnapshot> {
        let entry = self.cache.get(id)?;
        let now = self.clock.now();
        Some(CacheSnapshot {
            expires_at: entry.expires_at(&self.policy),
            is_valid: entry.is_valid(now, &self.policy),
            stream_info: entry.stream_info,
            origin: entry.origin,
            fetched_at: entry.fetched_at,
        })
    }

    async fn scrape(&self, channel: &ChannelConfig) -> std::result::Result<StreamInfo, ScrapeFailure> {
        let page_url = Url::parse(&channel.source_page).map_err(|e| {
            ScrapeFailure::fetch_failed(format!("invalid source page {}: {}", channel.source_page, e))
        })?;

        debug!(channel = %channel.id, page = %page_url, "Scraping stream URL");
        let page = self.fetcher.fetch_page(&page_url).await?;
        if page.url != page_url {
            debug!(channel = %channel.id, final_url = %page.url, "Source page redirected");
        }

        let (strategy, url) =
            extract_stream_url(&page.markup, &page.url).ok_or(ScrapeFailure::NoPatternMatched)?;
        debug!(channel = %channel.id, strategy, "Stream URL found");

        Ok(StreamInfo::from_url(url))
    }

    fn fallback(&self, channel: &ChannelConfig, cause: ScrapeFailure) -> Result<Resolution> {
        let Some(url) = channel.fallback_stream_url.as_deref() else {
            return Err(Error::ResolutionExhausted {
                channel: channel.id.clone(),
                cause,
            });
        };

        info!(channel = %channel.id, url, "Using fallback stream");
        let info = StreamInfo::from_url(url);
        self.store(&channel.id, info.clone(), EntryOrigin::Fallback);

        Ok(Resolution {
            info,
            source: ResolutionSource::Fallback,
        })
    }

    fn valid_entry(&self, id: &str) -> Option<CacheEntry> {
        self.cache.get_valid(id, self.clock.now(), &self.policy)
    }

    fn store(&self, id: &str, info: StreamInfo, origin: EntryOrigin) {
        self.cache
            .insert(id, CacheEntry::new(info, self.clock.now(), origin));
    }

    fn gate(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.entry(id.to_string()).or_default().clone()
    }
}

/// Builder for [`StreamResolver`]
#[derive(Default)]
pub struct ResolverBuilder {
    fetcher: Option<Arc<dyn PageFetcher>>,
    clock: Option<Arc<dyn Clock>>,
    policy: CachePolicy,
}

impl ResolverBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the resolver
    ///
    /// Without an explicit fetcher a default [`HttpPageFetcher`] is created.
    pub fn build(self) -> Result<StreamResolver> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpPageFetcher::new()?),
        };

        Ok(StreamResolver {
            fetcher,
            cache: StreamCache::new(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            policy: self.policy,
            gates: Mutex::new(HashMap::new()),
        })
    }
}
