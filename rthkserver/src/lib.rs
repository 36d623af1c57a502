//! # rthkserver - Axum-based web server for the RTHK Radio service
//!
//! This crate wraps Axum behind a small high-level API so that feature crates
//! can register their routes without knowing about each other.
//!
//! ## Features
//!
//! - **JSON routes** with [`Server::add_route`]
//! - **Stateful handlers and sub-routers** with [`Server::add_handler_with_state`]
//!   and [`Server::add_router`]
//! - **OpenAPI documentation** served through Swagger UI with [`Server::add_openapi`]
//! - **Logging** based on `tracing`, with an in-memory buffer exposed over SSE
//!   and a runtime level switch (see [`logs`])
//! - **Graceful stop** on Ctrl+C
//!
//! ## Example
//!
//! ```rust,no_run
//! use rthkserver::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new_configured().build();
//!     server.init_logging().await;
//!
//!     server.add_route("/info", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
