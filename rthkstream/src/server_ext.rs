//! rthkserver extension for RTHK radio
//!
//! Adds the RTHK routes to an `rthkserver::Server` without the server crate
//! knowing about this one.

use crate::channels::ChannelCatalog;
use crate::proxy::StreamProxy;
use crate::resolver::StreamResolver;
use anyhow::Result;
use std::sync::Arc;

/// State shared by the RTHK handlers
#[derive(Debug)]
pub struct RthkState {
    pub catalog: ChannelCatalog,
    pub resolver: StreamResolver,
    pub proxy: StreamProxy,
}

impl RthkState {
    pub fn new(catalog: ChannelCatalog, resolver: StreamResolver, proxy: StreamProxy) -> Self {
        Self {
            catalog,
            resolver,
            proxy,
        }
    }
}

/// Registers the RTHK API on an `rthkserver::Server`
///
/// ```rust,no_run
/// use rthkserver::ServerBuilder;
/// use rthkstream::RthkServerExt;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut server = ServerBuilder::new_configured().build();
///     server.init_rthk().await?;
///
///     server.start().await?;
///     server.wait().await;
///     Ok(())
/// }
/// ```
#[allow(async_fn_in_trait)]
pub trait RthkServerExt {
    /// Builds the catalog, resolver and proxy from the configuration and
    /// mounts the routes
    ///
    /// Routes:
    /// - `GET /api/channels`
    /// - `GET /api/stream-url/{channel_id}`
    /// - `GET /api/proxy?url=...`
    /// - `GET /api/health`
    ///
    /// Documentation is served at `/swagger-ui/rthk`.
    async fn init_rthk(&mut self) -> Result<Arc<RthkState>>;

    /// Mounts the routes over an existing state
    async fn init_rthk_with_state(&mut self, state: Arc<RthkState>) -> Result<Arc<RthkState>>;
}
