//! Logging system: tracing subscriber, in-memory ring buffer and log routes
//!
//! Every event that passes the (reloadable) level filter is stored in a ring
//! buffer and broadcast to `/log-sse` subscribers.

mod sselayer;

pub use sselayer::SseLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use rthkconfig::Config;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const AVAILABLE_LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// One captured log event
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Shared ring buffer plus live broadcast channel
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
    max_level: Arc<RwLock<Level>>,
    reload_handle: Option<reload::Handle<LevelFilter, Registry>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl LogState {
    /// Creates a state not bound to any subscriber filter
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            tx: broadcast::channel(1000).0,
            max_level: Arc::new(RwLock::new(Level::TRACE)),
            reload_handle: None,
        }
    }

    fn with_reload_handle(
        capacity: usize,
        level: Level,
        reload_handle: reload::Handle<LevelFilter, Registry>,
    ) -> Self {
        let mut state = Self::new(capacity);
        state.max_level = Arc::new(RwLock::new(level));
        state.reload_handle = Some(reload_handle);
        state
    }

    /// Changes the maximum level and reloads the subscriber filter
    pub fn set_max_level(&self, level: Level) {
        *write(&self.max_level) = level;

        if let Some(handle) = &self.reload_handle {
            if let Err(e) = handle.reload(level_to_levelfilter(level)) {
                eprintln!("Failed to reload log level filter: {}", e);
            }
        }
    }

    pub fn get_max_level(&self) -> Level {
        *read(&self.max_level)
    }

    pub(crate) fn push(&self, entry: LogEntry) {
        {
            let mut buf = write(&self.buffer);
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        read(&self.buffer).iter().cloned().collect()
    }
}

/// Query parameters for `/log-sse`
///
/// Level flags select which levels to show (none set means all levels);
/// `search` keeps entries whose message or target contains the text.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub error: Option<bool>,
    pub warn: Option<bool>,
    pub info: Option<bool>,
    pub debug: Option<bool>,
    pub trace: Option<bool>,
    pub search: Option<String>,
}

impl LogQuery {
    fn selected_levels(&self) -> Vec<Level> {
        [
            (self.error, Level::ERROR),
            (self.warn, Level::WARN),
            (self.info, Level::INFO),
            (self.debug, Level::DEBUG),
            (self.trace, Level::TRACE),
        ]
        .into_iter()
        .filter_map(|(flag, level)| flag.unwrap_or(false).then_some(level))
        .collect()
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        let Some(level) = string_to_level(&entry.level) else {
            return false;
        };

        let selected = self.selected_levels();
        if !selected.is_empty() && !selected.contains(&level) {
            return false;
        }

        match self.search.as_deref() {
            Some(needle) => entry.message.contains(needle) || entry.target.contains(needle),
            None => true,
        }
    }
}

/// Turns an entry into an SSE event when it passes both the live level and the query
fn render(entry: &LogEntry, max_level: Level, query: &LogQuery) -> Option<Event> {
    if !is_level_allowed(&entry.level, max_level) || !query.matches(entry) {
        return None;
    }
    serde_json::to_string(entry)
        .ok()
        .map(|json| Event::default().data(json))
}

/// SSE handler: replays the buffer, then streams new entries
pub async fn log_sse(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let mut rx = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in &history {
            if let Some(event) = render(entry, state.get_max_level(), &query) {
                yield Ok::<_, axum::Error>(event);
            }
        }

        loop {
            let entry = match rx.recv().await {
                Ok(entry) => entry,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if let Some(event) = render(&entry, state.get_max_level(), &query) {
                yield Ok::<_, axum::Error>(event);
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// REST handler: JSON dump of the buffer
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

fn is_level_allowed(log_level: &str, max_level: Level) -> bool {
    // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE
    string_to_level(log_level).is_some_and(|level| level <= max_level)
}

/// Logging initialization options
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Ring buffer capacity (entries kept)
    pub buffer_capacity: usize,
    /// Also print to the console
    pub enable_console: bool,
    /// Initial maximum level
    pub min_level: Level,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            enable_console: true,
            min_level: Level::INFO,
        }
    }
}

impl LoggingOptions {
    /// Reads the `host.logger` section, keeping defaults for unreadable values
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            buffer_capacity: config
                .get_log_cache_size()
                .unwrap_or(defaults.buffer_capacity),
            enable_console: config
                .get_log_enable_console()
                .unwrap_or(defaults.enable_console),
            min_level: config
                .get_log_min_level()
                .ok()
                .and_then(|l| string_to_level(&l))
                .unwrap_or(defaults.min_level),
        }
    }
}

/// Installs the global tracing subscriber
///
/// The reloadable level filter is registered before the buffer layer so that
/// filtered-out events are never stored.
pub fn init_logging(options: LoggingOptions) -> LogState {
    let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(options.min_level));

    let log_state =
        LogState::with_reload_handle(options.buffer_capacity, options.min_level, reload_handle);

    let subscriber = Registry::default()
        .with(filter)
        .with(SseLayer::new(log_state.clone()));

    let result = if options.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }

    log_state
}

/// Request body for `POST /api/log_setup`
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Response for `/api/log_setup`
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn for_level(level: Level) -> Self {
        Self {
            current_level: level.as_str().to_string(),
            available_levels: AVAILABLE_LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// GET /api/log_setup
#[utoipa::path(
    get,
    path = "/api/log_setup",
    responses(
        (status = 200, description = "Log configuration retrieved successfully", body = LogSetupResponse)
    ),
    tag = "logs"
)]
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::for_level(state.get_max_level()))
}

/// POST /api/log_setup
#[utoipa::path(
    post,
    path = "/api/log_setup",
    request_body = LogSetupRequest,
    responses(
        (status = 200, description = "Log level updated successfully", body = LogSetupResponse),
        (status = 400, description = "Invalid log level")
    ),
    tag = "logs"
)]
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid log level. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE"
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("Log level changed to: {}", payload.level);

    (StatusCode::OK, Json(LogSetupResponse::for_level(level))).into_response()
}

fn string_to_level(s: &str) -> Option<Level> {
    AVAILABLE_LEVELS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(s))
        .and_then(|name| name.parse().ok())
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    LevelFilter::from_level(level)
}

/// Router for the log level API
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/api/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

/// OpenAPI document for the log level API
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(log_setup_get, log_setup_post),
    components(schemas(LogSetupRequest, LogSetupResponse)),
    tags((name = "logs", description = "Log level configuration endpoints"))
)]
pub struct LogsApiDoc;
