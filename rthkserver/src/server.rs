//! # Server module - high-level API over Axum
//!
//! Routes are accumulated into a shared [`Router`] before [`Server::start`]
//! binds the listener; the router is cloned once at start-up.

use crate::logs::{LogState, LoggingOptions, LogsApiDoc, create_logs_router, init_logging, log_dump, log_sse};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use rthkconfig::get_config;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Serializable server description
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Main HTTP server
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// Creates a new server instance
    ///
    /// * `name` - server name (used in logs)
    /// * `base_url` - host name advertised in logs (e.g. "localhost")
    /// * `http_port` - port to listen on
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    async fn merge(&mut self, route: Router) {
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(route);
    }

    /// Adds a dynamic JSON route
    ///
    /// The closure is called on every GET request and its output serialized.
    ///
    /// ```rust,no_run
    /// # use rthkserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "localhost", 3000);
    /// server.add_route("/api/status", || async {
    ///     serde_json::json!({"status": "online"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        self.merge(Router::new().route(path, get(handler))).await;
    }

    /// Adds a GET handler with its own state
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route(path, get(handler)).with_state(state);
        self.merge(route).await;
    }

    /// Adds a sub-router
    ///
    /// - `"/"` merges the router at the root
    /// - any other path nests it under that prefix
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let route = if path == "/" {
            sub_router
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            Router::new().nest(&normalized, sub_router)
        };
        self.merge(route).await;
    }

    /// Adds a documented API with its Swagger UI
    ///
    /// `api_router` carries absolute paths (e.g. `/api/channels`) and is merged
    /// at the root. The documentation is served at `/swagger-ui/{name}` and the
    /// OpenAPI document at `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());

        let swagger = SwaggerUi::new(swagger_path).url(openapi_json_path, openapi);

        self.merge(api_router.merge(swagger)).await;
    }

    /// Snapshot of the router as currently assembled
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Binds the HTTP listener and serves the routes in a background task
    ///
    /// The task stops on Ctrl+C. Binding errors are returned to the caller.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(
            "Server {} running at http://{}:{}",
            self.name, self.base_url, self.http_port
        );

        let router = self.router().await;
        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                res = axum::serve(listener, router.into_make_service()).into_future() => {
                    if let Err(e) = res {
                        error!("HTTP server stopped: {}", e);
                    }
                }
                _ = shutdown_signal() => {
                    info!("Ctrl+C received, shutting down");
                }
            }
        }));

        Ok(())
    }

    /// Waits for the server task to finish
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }

    /// Log state, once [`Server::init_logging`] has run
    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Installs the tracing subscriber and registers the log routes
    ///
    /// Options come from the `host.logger` configuration section. Registers
    /// `/log-sse`, `/log-dump` and `/api/log_setup`.
    pub async fn init_logging(&mut self) {
        let options = LoggingOptions::from_config(&get_config());
        let log_state = init_logging(options);

        self.add_handler_with_state("/log-sse", log_sse, log_state.clone())
            .await;
        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;
        self.add_openapi(
            create_logs_router(log_state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(log_state);
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Builder for [`Server`]
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    /// Builder initialized from the `host` configuration section
    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: "RTHK-Radio-Server".to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_add_route_serves_json() {
        let mut server = ServerBuilder::new("Test", "localhost", 0).build();
        server
            .add_route("/info", || async { serde_json::json!({"version": "1.0.0"}) })
            .await;

        let response = server
            .router()
            .await
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_add_handler_with_state() {
        async fn greet(State(name): State<String>) -> String {
            format!("hello {}", name)
        }

        let mut server = Server::new("Test", "localhost", 0);
        server
            .add_handler_with_state("/greet", greet, "radio".to_string())
            .await;

        let response = server
            .router()
            .await
            .oneshot(Request::get("/greet").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello radio");
    }

    #[tokio::test]
    async fn test_add_router_nests_under_prefix() {
        let mut server = Server::new("Test", "localhost", 0);
        let sub = Router::new().route("/ping", get(|| async { "pong" }));
        server.add_router("nested", sub).await;

        let response = server
            .router()
            .await
            .oneshot(Request::get("/nested/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let missing = server
            .router()
            .await
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_openapi_serves_document() {
        #[derive(utoipa::OpenApi)]
        #[openapi(info(title = "Test API"))]
        struct TestDoc;

        let mut server = Server::new("Test", "localhost", 0);
        let api = Router::new().route("/api/ping", get(|| async { "pong" }));
        server.add_openapi(api, TestDoc::openapi(), "test").await;

        let router = server.router().await;
        let doc = router
            .clone()
            .oneshot(Request::get("/api-docs/test.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(doc.status(), StatusCode::OK);
        assert_eq!(body_json(doc).await["info"]["title"], "Test API");

        let ping = router
            .oneshot(Request::get("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ping.status(), StatusCode::OK);
    }

    #[test]
    fn test_builder_info() {
        let server = ServerBuilder::new("Radio", "localhost", 3001)
            .name("Other")
            .http_port(4000)
            .build();
        let info = server.info();
        assert_eq!(info.name, "Other");
        assert_eq!(info.base_url, "localhost");
        assert_eq!(info.http_port, 4000);
        assert!(server.log_state().is_none());
    }
}
