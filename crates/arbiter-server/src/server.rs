// crates/arbiter-server/src/server.rs
// ============================================================================
// Module: Arbiter HTTP Server
// Description: Axum surface: health, metrics, SSE stream, and tool dispatch.
// Purpose: Expose the runtime over HTTP with limits, auth, and audit.
// Dependencies: arbiter-core, arbiter-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server wires configuration into the runtime (persistence, chain,
//! pipeline, triggers, learning, digests) and exposes four endpoints:
//! `GET /health`, `GET /metrics`, `GET /sse`, and the tool surface under
//! `/api/tools`. Requests pass a body-size check, an in-flight semaphore, a
//! fixed-window rate limiter, and optional bearer auth before dispatch.
//! The SSE stream is live-only: no replay, heartbeat comments keep
//! intermediaries from closing idle connections, and catch-up happens through
//! the `search` and `chain` tools.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use arbiter_config::ArbiterConfig;
use arbiter_config::PersistenceKind;
use arbiter_config::RateLimitConfig;
use arbiter_core::DEFAULT_HASH_ALGORITHM;
use arbiter_core::Judge;
use arbiter_core::SharedPersistence;
use arbiter_core::Topic;
use arbiter_core::core::hashing::hash_bytes;
use arbiter_core::runtime::ChainManager;
use arbiter_core::runtime::DigestEngine;
use arbiter_core::runtime::EventBus;
use arbiter_core::runtime::JudgmentPipeline;
use arbiter_core::runtime::LearningEngine;
use arbiter_core::runtime::MemoryPersistence;
use arbiter_core::runtime::NoopTriggerSink;
use arbiter_core::runtime::TriggerEngine;
use arbiter_store_sqlite::SqlitePersistence;
use arbiter_store_sqlite::SqliteStoreConfig;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::Path as UrlPath;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_stream::wrappers::ReceiverStream;

use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::ToolAuditEvent;
use crate::audit::ToolAuditSink;
use crate::telemetry::PrometheusMetrics;
use crate::telemetry::ServerMetrics;
use crate::telemetry::ToolOutcome;
use crate::tools::ToolError;
use crate::tools::ToolName;
use crate::tools::ToolRouter;
use crate::tools::ToolRouterConfig;
use crate::tools::tool_definitions;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Fixed-window rate limiter with in-memory buckets.
struct RateLimiter {
    /// Rate limit configuration.
    config: RateLimitConfig,
    /// Per-key request buckets.
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

/// Rolling state for a single rate limit key.
struct RateLimitBucket {
    /// Window start time for the current bucket.
    window_start: Instant,
    /// Requests observed in the current window.
    count: u32,
    /// Last request timestamp for eviction.
    last_seen: Instant,
}

/// Decision returned by the rate limiter.
enum RateLimitDecision {
    /// Allow the request.
    Allow,
    /// Limit the request.
    Limited,
    /// Reject because the limiter is over capacity.
    OverCapacity,
}

impl RateLimiter {
    /// Creates a new rate limiter from configuration.
    fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Checks the limiter for the given key and updates the bucket.
    fn check(&self, key: &str) -> RateLimitDecision {
        let window = Duration::from_millis(self.config.window_ms);
        let ttl = Duration::from_millis(self.config.window_ms.saturating_mul(2));
        let now = Instant::now();
        let mut buckets = lock_unpoisoned(&self.buckets);
        if buckets.len() > self.config.max_entries {
            buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) <= ttl);
        }
        if buckets.len() > self.config.max_entries {
            return RateLimitDecision::OverCapacity;
        }
        let bucket = buckets.entry(key.to_string()).or_insert(RateLimitBucket {
            window_start: now,
            count: 0,
            last_seen: now,
        });
        if now.duration_since(bucket.window_start) >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.last_seen = now;
        if bucket.count >= self.config.max_requests {
            RateLimitDecision::Limited
        } else {
            bucket.count = bucket.count.saturating_add(1);
            RateLimitDecision::Allow
        }
    }
}

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared state for the HTTP handlers.
pub struct AppState {
    /// Tool router.
    router: ToolRouter,
    /// Event bus feeding the SSE stream.
    bus: EventBus,
    /// Durable store, for health reporting.
    persistence: SharedPersistence,
    /// Chain manager, for health reporting.
    chain: Arc<ChainManager>,
    /// Metrics registry.
    metrics: Arc<PrometheusMetrics>,
    /// Audit sink for tool calls.
    audit: Arc<dyn ToolAuditSink>,
    /// Maximum request body size.
    max_body_bytes: usize,
    /// In-flight request semaphore.
    inflight: Arc<Semaphore>,
    /// Optional rate limiter.
    rate_limiter: Option<RateLimiter>,
    /// Accepted bearer tokens; empty means no auth.
    bearer_tokens: Vec<String>,
    /// SSE heartbeat interval.
    heartbeat_interval_ms: u64,
}

/// HTTP envelope for tool responses.
#[derive(Debug, Serialize)]
struct ToolResponse {
    /// Whether the call succeeded.
    success: bool,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ToolResponseError>,
    /// Request latency in milliseconds.
    duration_ms: u64,
}

/// Error payload in the HTTP envelope.
#[derive(Debug, Serialize)]
struct ToolResponseError {
    /// Stable error kind label.
    kind: &'static str,
    /// Human-readable message.
    message: String,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Arbiter HTTP server instance.
pub struct ArbiterServer {
    /// Loaded configuration.
    config: ArbiterConfig,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl ArbiterServer {
    /// Builds the full runtime from configuration.
    ///
    /// Must be called within a Tokio runtime; the chain and trigger engines
    /// start background tasks immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(config: ArbiterConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let persistence = build_persistence(&config)?;
        let bus = EventBus::new(config.sse.channel_capacity);

        let chain = Arc::new(
            ChainManager::new(
                Arc::clone(&persistence),
                bus.clone(),
                config.chain.to_chain_config(&config.batch),
            )
            .map_err(|err| ServerError::Init(err.to_string()))?,
        );
        let learning = Arc::new(
            LearningEngine::new(
                Arc::clone(&persistence),
                config.learning.to_learning_config(),
            )
            .map_err(|err| ServerError::Init(err.to_string()))?,
        );
        let scoring = config
            .scoring
            .to_scoring_config()
            .map_err(|err| ServerError::Config(err.to_string()))?;
        let pipeline = Arc::new(JudgmentPipeline::new(
            Judge::new(scoring),
            Arc::clone(&persistence),
            Arc::clone(&chain),
            bus.clone(),
            Arc::clone(&learning),
        ));
        let triggers = Arc::new(
            TriggerEngine::new(
                Arc::clone(&persistence),
                bus.clone(),
                Arc::clone(&pipeline),
                Arc::new(NoopTriggerSink),
            )
            .map_err(|err| ServerError::Init(err.to_string()))?,
        );
        triggers.start(&config.triggers.to_engine_config());
        let digests = Arc::new(DigestEngine::new(Arc::clone(&persistence), bus.clone()));

        let router = ToolRouter::new(ToolRouterConfig {
            pipeline,
            chain: Arc::clone(&chain),
            triggers,
            learning,
            digests,
            persistence: Arc::clone(&persistence),
        })
        .map_err(|err| ServerError::Init(err.to_string()))?;

        let audit = build_audit_sink(&config)?;
        let rate_limiter = config.server.limits.rate_limit.clone().map(RateLimiter::new);
        let bearer_tokens = config
            .server
            .auth
            .as_ref()
            .map(|auth| auth.bearer_tokens.clone())
            .unwrap_or_default();
        emit_local_only_warning(bearer_tokens.is_empty());

        let state = Arc::new(AppState {
            router,
            bus,
            persistence,
            chain,
            metrics: Arc::new(PrometheusMetrics::new()),
            audit,
            max_body_bytes: config.server.max_body_bytes,
            inflight: Arc::new(Semaphore::new(config.server.limits.max_inflight)),
            rate_limiter,
            bearer_tokens,
            heartbeat_interval_ms: config.sse.heartbeat_interval_ms,
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the axum application router.
    #[must_use]
    pub fn app(&self) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/metrics", get(handle_metrics))
            .route("/sse", get(handle_sse))
            .route("/api/tools", get(handle_tools_list))
            .route("/api/tools/{name}", post(handle_tool_call))
            .with_state(Arc::clone(&self.state))
    }

    /// Returns the shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Serves requests until the listener fails or the task is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .map_err(|_| ServerError::Config("invalid bind address".to_string()))?;
        let app = self.app();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the persistence backend from configuration.
fn build_persistence(config: &ArbiterConfig) -> Result<SharedPersistence, ServerError> {
    match config.persistence.kind {
        PersistenceKind::Memory => Ok(Arc::new(MemoryPersistence::new())),
        PersistenceKind::Sqlite => {
            let path = config
                .persistence
                .path
                .clone()
                .ok_or_else(|| ServerError::Config("sqlite persistence requires path".to_string()))?;
            let store = SqlitePersistence::open(&SqliteStoreConfig {
                path,
                busy_timeout_ms: config.persistence.busy_timeout_ms,
            })
            .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Builds the audit sink from configuration.
fn build_audit_sink(config: &ArbiterConfig) -> Result<Arc<dyn ToolAuditSink>, ServerError> {
    if !config.server.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    if let Some(path) = &config.server.audit.path {
        let sink = FileAuditSink::new(Path::new(path))
            .map_err(|err| ServerError::Config(format!("audit log open failed: {err}")))?;
        return Ok(Arc::new(sink));
    }
    Ok(Arc::new(StderrAuditSink))
}

/// Emits a warning when running without bearer auth.
fn emit_local_only_warning(no_auth: bool) {
    if no_auth {
        let _ = writeln!(
            std::io::stderr(),
            "arbiter-server: WARNING: serving without auth; configure server.auth to enable \
             bearer tokens"
        );
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `GET /health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let persistence_ready = state.persistence.readiness().is_ok();
    let chain = state.chain.status();
    let status = if persistence_ready { "ok" } else { "degraded" };
    let body = json!({
        "status": status,
        "identity": "arbiter",
        "persistence": {
            "status": if persistence_ready { "ok" } else { "unavailable" },
            "capabilities": ["judgments", "blocks", "feedback", "digests", "triggers", "learning"],
        },
        "chain": {
            "initialized": chain.initialized,
            "head_slot": chain.head_slot,
            "pending_judgments": chain.pending_judgments,
        },
        "sse_subscribers": state.bus.subscriber_count(),
    });
    axum::Json(body)
}

/// Handles `GET /metrics`.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render(state.bus.dropped_total());
    ([("content-type", "text/plain; version=0.0.4")], body)
}

/// Handles `GET /api/tools`.
async fn handle_tools_list(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(json!({ "tools": tool_definitions() }))
}

/// Handles `POST /api/tools/{name}`.
async fn handle_tool_call(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let response = dispatch_tool_call(&state, &name, Some(peer), &headers, &body).await;
    (response.0, axum::Json(response.1))
}

/// Runs the limit, auth, parse, and dispatch path for one tool call.
///
/// Split from the axum handler so tests can exercise it without a socket.
pub(crate) async fn dispatch_tool_call(
    state: &Arc<AppState>,
    name: &str,
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, Value) {
    let started_at = Instant::now();
    let tool = ToolName::parse(name);

    let Ok(_permit) = state.inflight.try_acquire() else {
        return finish(
            state,
            tool,
            Err(transport_error("inflight_limit", "server overloaded")),
            StatusCode::SERVICE_UNAVAILABLE,
            started_at,
            body.len(),
            peer,
        );
    };
    if let Some(rate_limiter) = &state.rate_limiter {
        match rate_limiter.check(&rate_limit_key(peer, headers)) {
            RateLimitDecision::Allow => {}
            RateLimitDecision::Limited => {
                return finish(
                    state,
                    tool,
                    Err(transport_error("rate_limited", "rate limit exceeded")),
                    StatusCode::TOO_MANY_REQUESTS,
                    started_at,
                    body.len(),
                    peer,
                );
            }
            RateLimitDecision::OverCapacity => {
                return finish(
                    state,
                    tool,
                    Err(transport_error("inflight_limit", "rate limiter overloaded")),
                    StatusCode::SERVICE_UNAVAILABLE,
                    started_at,
                    body.len(),
                    peer,
                );
            }
        }
    }
    if body.len() > state.max_body_bytes {
        return finish(
            state,
            tool,
            Err(transport_error("request_too_large", "request body too large")),
            StatusCode::PAYLOAD_TOO_LARGE,
            started_at,
            body.len(),
            peer,
        );
    }
    if !authorized(state, headers) {
        return finish(
            state,
            tool,
            Err(transport_error("unauthenticated", "missing or invalid bearer token")),
            StatusCode::UNAUTHORIZED,
            started_at,
            body.len(),
            peer,
        );
    }

    let payload: Value = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(err) => {
                return finish(
                    state,
                    tool,
                    Err(("invalid_input", format!("invalid json: {err}"))),
                    StatusCode::BAD_REQUEST,
                    started_at,
                    body.len(),
                    peer,
                );
            }
        }
    };

    state.bus.publish(Topic::ToolPre, json!({ "tool": name }));
    let result = state.router.handle(name, payload).await;
    let (status, mapped) = match result {
        Ok(value) => (StatusCode::OK, Ok(value)),
        Err(error) => (status_for(&error), Err((error.kind(), error.to_string()))),
    };
    state.bus.publish(
        Topic::ToolPost,
        json!({
            "tool": name,
            "outcome": if mapped.is_ok() { "ok" } else { "error" },
        }),
    );
    finish(state, tool, mapped, status, started_at, body.len(), peer)
}

/// Builds a transport-level error tuple.
fn transport_error(kind: &'static str, message: &str) -> (&'static str, String) {
    (kind, message.to_string())
}

/// Maps a tool error to an HTTP status code.
fn status_for(error: &ToolError) -> StatusCode {
    match error {
        ToolError::UnknownTool => StatusCode::NOT_FOUND,
        ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Records metrics and audit, and builds the response envelope.
fn finish(
    state: &Arc<AppState>,
    tool: Option<ToolName>,
    result: Result<Value, (&'static str, String)>,
    status: StatusCode,
    started_at: Instant,
    request_bytes: usize,
    peer: Option<SocketAddr>,
) -> (StatusCode, Value) {
    let latency = started_at.elapsed();
    let duration_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let (outcome, error_kind, envelope) = match result {
        Ok(value) => (
            ToolOutcome::Ok,
            None,
            ToolResponse {
                success: true,
                result: Some(value),
                error: None,
                duration_ms,
            },
        ),
        Err((kind, message)) => (
            ToolOutcome::Error,
            Some(kind),
            ToolResponse {
                success: false,
                result: None,
                error: Some(ToolResponseError {
                    kind,
                    message,
                }),
                duration_ms,
            },
        ),
    };
    let body = serde_json::to_value(&envelope).unwrap_or_else(|_| {
        json!({
            "success": false,
            "error": { "kind": "serialization", "message": "response serialization failed" },
            "duration_ms": duration_ms,
        })
    });
    let response_bytes = body.to_string().len();
    state.metrics.record_tool(tool, outcome, latency);
    state.audit.record(&ToolAuditEvent::new(
        tool.map(|tool| tool.as_str().to_string()),
        outcome,
        error_kind,
        request_bytes,
        response_bytes,
        duration_ms,
        peer.map(|peer| peer.ip().to_string()),
    ));
    (status, body)
}

/// Checks the bearer token when auth is configured.
fn authorized(state: &Arc<AppState>, headers: &HeaderMap) -> bool {
    if state.bearer_tokens.is_empty() {
        return true;
    }
    let Some(value) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };
    state.bearer_tokens.iter().any(|accepted| accepted == token)
}

/// Derives the rate limit key for a request.
fn rate_limit_key(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, token.as_bytes());
        return format!("bearer:{}", digest.value);
    }
    peer.map_or_else(|| "transport:http".to_string(), |peer| format!("ip:{}", peer.ip()))
}

// ============================================================================
// SECTION: SSE
// ============================================================================

/// Handles `GET /sse`: a live stream of bus events.
async fn handle_sse(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let subscription = state.bus.subscribe_all();
    state.metrics.sse_connected();
    state.bus.publish(Topic::Connection, json!({ "event": "connect" }));

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(16);
    let forwarder_state = Arc::clone(&state);
    drop(tokio::spawn(async move {
        let greeting = Event::default().event("endpoint").data(
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "topics": Topic::ALL.iter().map(|topic| topic.as_str()).collect::<Vec<_>>(),
            })
            .to_string(),
        );
        if tx.send(Ok(greeting)).await.is_err() {
            subscription.close();
            forwarder_state.metrics.sse_disconnected();
            return;
        }
        while let Some(event) = subscription.recv().await {
            let payload =
                serde_json::to_string(&event.payload).unwrap_or_else(|_| "null".to_string());
            let frame = Event::default().event(event.topic.as_str()).data(payload);
            if tx.send(Ok(frame)).await.is_err() {
                break;
            }
        }
        subscription.close();
        forwarder_state.metrics.sse_disconnected();
        forwarder_state
            .bus
            .publish(Topic::Connection, json!({ "event": "disconnect" }));
    }));

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_millis(state.heartbeat_interval_ms))
            .text("keep-alive"),
    )
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::sync::Arc;

    use arbiter_config::ArbiterConfig;
    use arbiter_config::RateLimitConfig;
    use arbiter_config::ServerAuthConfig;
    use axum::http::HeaderMap;
    use axum::http::StatusCode;
    use serde_json::json;

    use super::ArbiterServer;
    use super::AppState;
    use super::dispatch_tool_call;

    fn server_with(config: ArbiterConfig) -> ArbiterServer {
        ArbiterServer::from_config(config).expect("server")
    }

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).expect("body bytes")
    }

    async fn call(
        state: &Arc<AppState>,
        name: &str,
        payload: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        dispatch_tool_call(state, name, None, &HeaderMap::new(), &body(payload)).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn judge_tool_returns_success_envelope() {
        let server = server_with(ArbiterConfig::default());
        let state = server.state();
        let payload = json!({ "item": { "type": "note", "content": "hello" } });
        let (status, envelope) = call(&state, "judge", &payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope["success"], true);
        let result = &envelope["result"];
        assert!(result["id"].is_string());
        assert!(result["q_score"].is_u64());
        assert!(envelope["duration_ms"].is_u64());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_tool_returns_not_found() {
        let server = server_with(ArbiterConfig::default());
        let state = server.state();
        let (status, envelope) = call(&state, "nonexistent", &json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"]["kind"], "unknown_tool");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_violation_is_invalid_input() {
        let server = server_with(ArbiterConfig::default());
        let state = server.state();
        let (status, envelope) = call(&state, "judge", &json!({ "item": {} })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope["error"]["kind"], "invalid_input");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bearer_auth_gates_tool_calls() {
        let config = ArbiterConfig {
            server: arbiter_config::ServerConfig {
                auth: Some(ServerAuthConfig {
                    bearer_tokens: vec!["sesame".to_string()],
                }),
                ..arbiter_config::ServerConfig::default()
            },
            ..ArbiterConfig::default()
        };
        let server = server_with(config);
        let state = server.state();

        let payload = json!({ "query": "anything" });
        let (status, envelope) =
            dispatch_tool_call(&state, "search", None, &HeaderMap::new(), &body(&payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(envelope["error"]["kind"], "unauthenticated");

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer sesame".parse().expect("header"));
        let (status, envelope) =
            dispatch_tool_call(&state, "search", None, &headers, &body(&payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope["success"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limit_rejects_after_threshold() {
        let config = ArbiterConfig {
            server: arbiter_config::ServerConfig {
                limits: arbiter_config::ServerLimitsConfig {
                    rate_limit: Some(RateLimitConfig {
                        max_requests: 1,
                        window_ms: 60_000,
                        max_entries: 8,
                    }),
                    ..arbiter_config::ServerLimitsConfig::default()
                },
                ..arbiter_config::ServerConfig::default()
            },
            ..ArbiterConfig::default()
        };
        let server = server_with(config);
        let state = server.state();
        let payload = json!({ "query": "anything" });
        let first = call(&state, "search", &payload).await;
        assert_eq!(first.0, StatusCode::OK);
        let second = call(&state, "search", &payload).await;
        assert_eq!(second.0, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.1["error"]["kind"], "rate_limited");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_body_is_rejected() {
        let config = ArbiterConfig {
            server: arbiter_config::ServerConfig {
                max_body_bytes: 16,
                ..arbiter_config::ServerConfig::default()
            },
            ..ArbiterConfig::default()
        };
        let server = server_with(config);
        let state = server.state();
        let payload = json!({ "query": "a much longer body than sixteen bytes" });
        let (status, envelope) = call(&state, "search", &payload).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(envelope["error"]["kind"], "request_too_large");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chain_flush_and_search_round_trip() {
        let server = server_with(ArbiterConfig::default());
        let state = server.state();
        let payload = json!({ "item": { "type": "note", "content": "observable latency note" } });
        let (_, judged) = call(&state, "judge", &payload).await;
        let id = judged["result"]["id"].as_str().expect("id").to_string();

        let (_, flushed) = call(&state, "chain", &json!({ "action": "flush" })).await;
        assert_eq!(flushed["result"]["sealed"]["slot"], 1);
        assert_eq!(flushed["result"]["sealed"]["judgment_ids"][0], id);

        let (_, found) = call(&state, "search", &json!({ "query": "latency" })).await;
        assert_eq!(found["result"]["total"], 1);
    }
}
