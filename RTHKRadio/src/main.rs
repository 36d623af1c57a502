use rthkconfig::get_config;
use rthkserver::ServerBuilder;
use rthkstream::{RthkConfigExt, RthkServerExt};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = ServerBuilder::new_configured().build();

    // Logging first so that everything below ends up in the log buffer
    server.init_logging().await;

    server
        .add_route("/info", || async {
            serde_json::json!({
                "name": "RTHKRadio",
                "version": env!("CARGO_PKG_VERSION"),
            })
        })
        .await;

    if get_config().get_rthk_enabled()? {
        info!("📻 Initializing RTHK channels...");
        let state = server.init_rthk().await?;
        for channel in state.catalog.iter() {
            info!("  - {} ({})", channel.name.en, channel.id);
        }
    } else {
        warn!("⚠️ RTHK source disabled in configuration");
    }

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ RTHKRadio is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
