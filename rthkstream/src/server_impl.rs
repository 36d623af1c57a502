//! [`RthkServerExt`] implementation for `rthkserver::Server`

use crate::api_rest::{create_router, RthkApiDoc};
use crate::channels::ChannelCatalog;
use crate::config_ext::RthkConfigExt;
use crate::fetcher::HttpPageFetcher;
use crate::proxy::StreamProxy;
use crate::resolver::StreamResolver;
use crate::server_ext::{RthkServerExt, RthkState};
use anyhow::Result;
use rthkserver::Server;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

impl RthkServerExt for Server {
    async fn init_rthk(&mut self) -> Result<Arc<RthkState>> {
        info!("Initializing RTHK API...");

        let settings = rthkconfig::get_config().get_rthk_settings()?;
        let fetcher = HttpPageFetcher::builder()
            .timeout(settings.request_timeout)
            .user_agent(&settings.user_agent)
            .build()?;

        let resolver = StreamResolver::builder()
            .fetcher(Arc::new(fetcher))
            .policy(settings.cache_policy())
            .build()?;

        let proxy = StreamProxy::with_settings(&settings.user_agent, settings.request_timeout)?;

        let state = Arc::new(RthkState::new(
            ChannelCatalog::rthk_default(),
            resolver,
            proxy,
        ));

        self.init_rthk_with_state(state).await
    }

    async fn init_rthk_with_state(&mut self, state: Arc<RthkState>) -> Result<Arc<RthkState>> {
        let router = create_router(state.clone());
        self.add_openapi(router, RthkApiDoc::openapi(), "rthk").await;

        info!(
            channels = state.catalog.len(),
            ttl_secs = state.resolver.policy().ttl.as_secs(),
            "RTHK API initialized"
        );
        info!("API endpoints available at /api/*");

        Ok(state)
    }
}
