//! Route tests: JSON envelopes, status codes and proxy headers

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use rthkserver::Server;
use rthkstream::{
    create_router, ChannelCatalog, ChannelConfig, HttpPageFetcher, LocalizedName, ManualClock,
    RthkServerExt, RthkState, StreamProxy, StreamResolver,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// radio1 has a scrapable page, radio2 an empty page and no fallback
async fn test_state(server: &MockServer) -> Arc<RthkState> {
    Mock::given(method("GET"))
        .and(path("/radio/radio1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><script>player.load("https://host/path/stream.m3u8")</script></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/radio/radio2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;

    let catalog = ChannelCatalog::new(vec![
        ChannelConfig::new(
            "radio1",
            LocalizedName::new("RTHK Radio 1", "RTHK 第一台"),
            format!("{}/radio/radio1", server.uri()),
        ),
        ChannelConfig::new(
            "radio2",
            LocalizedName::new("RTHK Radio 2", "RTHK 第二台"),
            format!("{}/radio/radio2", server.uri()),
        ),
    ]);

    let fetcher = HttpPageFetcher::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let resolver = StreamResolver::builder()
        .fetcher(Arc::new(fetcher))
        .clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();
    let proxy = StreamProxy::with_settings("test-agent", Duration::from_secs(5)).unwrap();

    Arc::new(RthkState::new(catalog, resolver, proxy))
}

async fn get(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(
            Request::get(uri)
                .header(header::ORIGIN, "http://player.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_value<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn proxy_uri(target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/api/proxy?url={}", encoded)
}

#[tokio::test]
async fn test_list_channels() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/channels").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("*")
    );

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["channels"].as_array().unwrap().len(), 2);
    assert_eq!(
        json["channels"][0],
        serde_json::json!({"id": "radio1", "name": {"en": "RTHK Radio 1", "zh": "RTHK 第一台"}})
    );
    // internal fields are not exposed
    assert!(json["channels"][0].get("sourcePage").is_none());
}

#[tokio::test]
async fn test_stream_url_success() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/stream-url/radio1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "success": true,
            "type": "hls",
            "url": "https://host/path/stream.m3u8"
        })
    );
}

#[tokio::test]
async fn test_stream_url_unknown_channel() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/stream-url/radio9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"success": false, "error": "Channel 'radio9' not found"})
    );
}

#[tokio::test]
async fn test_stream_url_resolution_failure() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/stream-url/radio2").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Failed to resolve stream URL");
    assert!(json["details"].as_str().unwrap().contains("radio2"));
}

#[tokio::test]
async fn test_proxy_requires_url() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    for uri in ["/api/proxy", "/api/proxy?url="] {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some("*")
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": false, "error": "URL parameter is required"})
        );
    }
}

#[tokio::test]
async fn test_proxy_malformed_query_uses_json_envelope() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/proxy?url=http%3A%2F%2Fa&url=http%3A%2F%2Fb").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("*")
    );

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("query string"));
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn test_proxy_rejects_non_http_url() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, &proxy_uri("ftp://files.example/stream")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "URL must start with http:// or https://"
    );
}

#[tokio::test]
async fn test_proxy_streams_upstream_bytes() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live/chunk.aac"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/aac")
                .set_body_bytes(vec![0xFFu8, 0xF1, 0x50, 0x80]),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let response = get(&router, &proxy_uri(&format!("{}/live/chunk.aac", upstream.uri()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, header::CONTENT_TYPE), Some("audio/aac"));
    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("*")
    );
    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_METHODS),
        Some("GET")
    );
    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_HEADERS),
        Some("Content-Type")
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], &[0xFFu8, 0xF1, 0x50, 0x80][..]);

    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(
        requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok()),
        Some("test-agent")
    );
}

#[tokio::test]
async fn test_proxy_upstream_failure() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&upstream)
        .await;

    let response = get(&router, &proxy_uri(&upstream.uri())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Proxy request failed");
    assert!(json["details"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let router = create_router(test_state(&server).await);

    let response = get(&router, "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "healthy");
    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_server_extension_mounts_routes_and_docs() {
    let server = MockServer::start().await;
    let state = test_state(&server).await;

    let mut http = Server::new("Test", "localhost", 0);
    let returned = http.init_rthk_with_state(state.clone()).await.unwrap();
    assert!(Arc::ptr_eq(&returned, &state));

    let router = http.router().await;

    let channels = get(&router, "/api/channels").await;
    assert_eq!(channels.status(), StatusCode::OK);

    let doc = get(&router, "/api-docs/rthk.json").await;
    assert_eq!(doc.status(), StatusCode::OK);
    let json = body_json(doc).await;
    assert_eq!(json["info"]["title"], "RTHK Radio API");
    assert!(json["paths"].get("/api/stream-url/{channel_id}").is_some());
    assert!(json["paths"].get("/api/proxy").is_some());
}
