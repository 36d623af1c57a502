//! REST API for the RTHK channels
//!
//! Every JSON response carries a `success` flag; failures add `error` and,
//! for server-side failures, `details`.

use crate::error::Error;
use crate::models::{ChannelSummary, StreamInfo};
use crate::server_ext::RthkState;
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};
use utoipa::OpenApi;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Error envelope
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                success: false,
                error: error.into(),
                details,
            },
        }
    }

    /// Caller errors carry their own message; anything else becomes a 500
    /// with `summary` as the error and the cause in `details`
    fn from_error(err: &Error, client_status: StatusCode, summary: &str) -> Self {
        if err.is_client_error() {
            Self::new(client_status, err.to_string(), None)
        } else {
            Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                summary,
                Some(err.to_string()),
            )
        }
    }

    fn resolution(err: &Error) -> Self {
        Self::from_error(err, StatusCode::NOT_FOUND, "Failed to resolve stream URL")
    }

    fn proxy(err: &Error) -> Self {
        Self::from_error(err, StatusCode::BAD_REQUEST, "Proxy request failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// GET /api/channels response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChannelsResponse {
    pub success: bool,
    pub channels: Vec<ChannelSummary>,
}

/// GET /api/stream-url/{channel_id} response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StreamUrlResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stream: StreamInfo,
}

/// GET /api/health response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProxyQuery {
    /// Absolute http(s) URL to relay
    pub url: Option<String>,
}

/// Builds the RTHK router (absolute `/api/...` paths)
///
/// The JSON routes get a permissive CORS layer; the proxy route writes its
/// own CORS headers.
pub fn create_router(state: Arc<RthkState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let json_routes = Router::new()
        .route("/api/channels", get(list_channels))
        .route("/api/stream-url/{channel_id}", get(get_stream_url))
        .route("/api/health", get(health))
        .layer(cors);

    Router::new()
        .route("/api/proxy", get(proxy_stream))
        .merge(json_routes)
        .with_state(state)
}

/// GET /api/channels
#[utoipa::path(
    get,
    path = "/api/channels",
    responses(
        (status = 200, description = "Available channels", body = ChannelsResponse)
    ),
    tag = "rthk"
)]
async fn list_channels(State(state): State<Arc<RthkState>>) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        success: true,
        channels: state.catalog.summaries(),
    })
}

/// GET /api/stream-url/{channel_id}
#[utoipa::path(
    get,
    path = "/api/stream-url/{channel_id}",
    params(("channel_id" = String, Path, description = "Channel identifier, e.g. radio1")),
    responses(
        (status = 200, description = "Playable stream URL", body = StreamUrlResponse),
        (status = 404, description = "Unknown channel", body = ErrorResponse),
        (status = 500, description = "No stream URL could be resolved", body = ErrorResponse)
    ),
    tag = "rthk"
)]
async fn get_stream_url(
    State(state): State<Arc<RthkState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<StreamUrlResponse>, ApiError> {
    let channel = state
        .catalog
        .get(&channel_id)
        .ok_or_else(|| ApiError::resolution(&Error::ChannelNotFound(channel_id.clone())))?;

    let stream = state.resolver.resolve(channel).await.map_err(|e| {
        error!(channel = %channel_id, "Error resolving stream URL: {}", e);
        ApiError::resolution(&e)
    })?;

    Ok(Json(StreamUrlResponse {
        success: true,
        stream,
    }))
}

/// GET /api/proxy?url=...
#[utoipa::path(
    get,
    path = "/api/proxy",
    params(ProxyQuery),
    responses(
        (status = 200, description = "Upstream bytes, Content-Type forwarded", content_type = "application/octet-stream"),
        (status = 400, description = "Missing or invalid URL", body = ErrorResponse),
        (status = 500, description = "Upstream request failed", body = ErrorResponse)
    ),
    tag = "rthk"
)]
async fn proxy_stream(
    State(state): State<Arc<RthkState>>,
    query: Result<Query<ProxyQuery>, QueryRejection>,
) -> Response {
    let url = match query {
        Ok(Query(query)) => query.url.unwrap_or_default(),
        Err(rejection) => {
            let err = Error::InvalidProxyUrl(rejection.body_text());
            warn!("Proxy error: {}", err);
            return with_proxy_cors(ApiError::proxy(&err).into_response());
        }
    };

    let response = match state.proxy.open(&url).await {
        Ok(upstream) => {
            let content_type = upstream
                .content_type()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
                .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, content_type);
            (headers, Body::from_stream(upstream.into_stream())).into_response()
        }
        Err(e) => {
            warn!(url = %url, "Proxy error: {}", e);
            ApiError::proxy(&e).into_response()
        }
    };

    with_proxy_cors(response)
}

/// CORS headers of the proxy route, set on success and error responses alike
fn with_proxy_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "rthk"
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RTHK Radio API",
        version = "0.1.0",
        description = "Channel list, stream URL resolution and stream proxy for RTHK live radio"
    ),
    paths(list_channels, get_stream_url, proxy_stream, health),
    components(schemas(
        ChannelsResponse,
        StreamUrlResponse,
        HealthResponse,
        ErrorResponse,
        ChannelSummary,
        StreamInfo,
        crate::models::LocalizedName,
        crate::models::StreamType
    )),
    tags((name = "rthk", description = "RTHK live radio endpoints"))
)]
pub struct RthkApiDoc;
