//! RTHK live radio stream resolution
//!
//! This crate turns an RTHK channel identifier into a playable stream URL and
//! serves the result over HTTP.
//!
//! # Features
//!
//! - **Channel Catalog**: RTHK Radio 1 to 5 with bilingual names and known
//!   HLS fallbacks
//! - **Stream Resolution**: cache, then a live scrape of the channel page,
//!   then the static fallback
//! - **Bounded Cache**: scraped URLs kept 30 minutes, fallbacks 6 minutes
//! - **Stream Proxy**: byte passthrough with permissive CORS headers
//! - **Configuration Extension**: TTLs, timeout and User-Agent in rthkconfig
//! - **Server Extension**: REST routes and OpenAPI docs on rthkserver
//!
//! # Example
//!
//! ```no_run
//! use rthkstream::{ChannelCatalog, StreamResolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = ChannelCatalog::rthk_default();
//!     let resolver = StreamResolver::new()?;
//!
//!     if let Some(channel) = catalog.get("radio1") {
//!         let stream = resolver.resolve(channel).await?;
//!         println!("{} stream at {}", stream.stream_type, stream.url);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Time and network are injected: build a resolver with a
//! [`ManualClock`] and any [`PageFetcher`] to exercise expiry and fallback
//! without waiting or touching the network.

pub mod cache;
pub mod channels;
pub mod clock;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod proxy;
pub mod resolver;
pub mod scrape;

#[cfg(feature = "rthkconfig")]
pub mod config_ext;

#[cfg(feature = "server")]
pub mod api_rest;

#[cfg(feature = "server")]
pub mod server_ext;

#[cfg(feature = "server")]
mod server_impl;

// Re-exports
pub use cache::{CacheEntry, CachePolicy, EntryOrigin, StreamCache};
pub use channels::ChannelCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result, ScrapeFailure};
pub use fetcher::{FetcherBuilder, HttpPageFetcher, PageFetcher, SourcePage};
pub use models::{ChannelConfig, ChannelSummary, LocalizedName, StreamInfo, StreamType};
pub use proxy::{ProxiedStream, StreamProxy};
pub use resolver::{CacheSnapshot, Resolution, ResolutionSource, ResolverBuilder, StreamResolver};

#[cfg(feature = "rthkconfig")]
pub use config_ext::{RthkConfigExt, RthkSettings};

#[cfg(feature = "server")]
pub use api_rest::{create_router, RthkApiDoc};

#[cfg(feature = "server")]
pub use server_ext::{RthkServerExt, RthkState};
