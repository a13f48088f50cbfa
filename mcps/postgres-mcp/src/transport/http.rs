//! HTTP transport
//!
//! - `POST /mcp` takes one JSON-RPC request, answers it inline and
//!   broadcasts the same response to every SSE subscriber
//! - `GET /sse` streams broadcast responses
//! - `GET /health` is a liveness check

use super::jsonrpc::{decode_request, dispatch};
use super::subscribers::SubscriberHub;
use crate::config::HttpSettings;
use crate::server::PostgresMcpServer;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const HEALTH_BODY: &str = "PostgreSQL MCP Server is running";

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub server: PostgresMcpServer,
    pub hub: Arc<SubscriberHub>,
    pub keep_alive: Duration,
}

/// Build the router with all routes
pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/sse", get(handle_sse))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn handle_mcp(State(state): State<HttpState>, body: Bytes) -> Response {
    let request = match decode_request(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("Rejected request body: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let Some(response) = dispatch(&state.server, request).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let json = match serde_json::to_string(&response) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let delivered = state.hub.broadcast(&json);
    tracing::debug!(delivered, "Broadcast response to SSE subscribers");

    ([(header::CONTENT_TYPE, "application/json")], json).into_response()
}

async fn handle_sse(State(state): State<HttpState>) -> impl IntoResponse {
    let subscription = state.hub.subscribe();
    let client_id = subscription.id().to_string();
    tracing::info!(client = %client_id, "SSE client connected");

    let connected = serde_json::json!({ "event": "connected", "clientId": client_id }).to_string();
    let sse = Sse::new(event_stream(connected, subscription))
        .keep_alive(KeepAlive::new().interval(state.keep_alive));

    ([(header::CACHE_CONTROL, "no-cache")], sse)
}

fn event_stream(
    connected: String,
    subscription: super::subscribers::Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let first = stream::once(async move { Ok(Event::default().data(connected)) });
    let rest = stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.recv().await?;
        Some((Ok(Event::default().data(message)), subscription))
    });
    first.chain(rest)
}

async fn health() -> &'static str {
    HEALTH_BODY
}

/// A running HTTP listener
pub struct HttpTransport {
    local_addr: SocketAddr,
    hub: Arc<SubscriberHub>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
    grace: Duration,
}

impl HttpTransport {
    /// Bind the listener and start serving in a background task
    pub async fn bind(settings: &HttpSettings, server: PostgresMcpServer) -> Result<Self> {
        let listener = TcpListener::bind(&settings.addr)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {}", settings.addr))?;
        let local_addr = listener.local_addr()?;

        let hub = Arc::new(SubscriberHub::new(settings.subscriber_buffer));
        let app = router(HttpState {
            server,
            hub: Arc::clone(&hub),
            keep_alive: settings.keep_alive,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!("HTTP transport listening on http://{}", local_addr);

        Ok(Self {
            local_addr,
            hub,
            shutdown_tx,
            handle,
            grace: settings.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> &Arc<SubscriberHub> {
        &self.hub
    }

    /// Stop accepting, end SSE streams, then wait for in-flight requests
    ///
    /// The server task is aborted if it has not drained within the grace
    /// period.
    pub async fn shutdown(self) {
        let Self {
            hub,
            shutdown_tx,
            mut handle,
            grace,
            ..
        } = self;

        let _ = shutdown_tx.send(());
        hub.close_all();

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(()))) => tracing::info!("HTTP transport stopped"),
            Ok(Ok(Err(e))) => tracing::warn!("HTTP server error: {}", e),
            Ok(Err(e)) => tracing::warn!("HTTP server task failed: {}", e),
            Err(_) => {
                tracing::warn!("HTTP transport did not drain within {:?}, aborting", grace);
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Row, SqlValue};
    use crate::resources::ResourceRegistry;
    use crate::testing::FakeDatabase;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    fn state(db: FakeDatabase) -> HttpState {
        let registry = ResourceRegistry::new("postgres://host/db", &["users".to_string()]);
        HttpState {
            server: PostgresMcpServer::new(Arc::new(db), registry),
            hub: Arc::new(SubscriberHub::new(8)),
            keep_alive: Duration::from_secs(30),
        }
    }

    fn post_mcp(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state(FakeDatabase::new()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(body_string(response).await, HEALTH_BODY);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let db = FakeDatabase::new();
        let state = state(db);
        let app = router(state.clone());

        let response = app.clone().oneshot(post_mcp("{oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post_mcp(r#"{"jsonrpc":"2.0","id":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("missing method"));
    }

    #[tokio::test]
    async fn test_get_mcp_not_allowed() {
        let app = router(state(FakeDatabase::new()));
        let request = Request::builder().uri("/mcp").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_response_is_returned_and_broadcast() {
        let mut row = Row::new();
        row.insert("x", SqlValue::Int(1));
        let state = state(FakeDatabase::new().with_query_rows(vec![row]));
        let mut subscriber = state.hub.subscribe();
        let app = router(state.clone());

        let response = app
            .oneshot(post_mcp(
                r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"query","arguments":{"sql":"SELECT 1 AS x"}}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = body_string(response).await;

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["result"]["content"][0]["text"], "[\n  {\n    \"x\": 1\n  }\n]");

        assert_eq!(subscriber.try_recv().unwrap(), body);
    }

    #[tokio::test]
    async fn test_notification_is_accepted_without_broadcast() {
        let state = state(FakeDatabase::new());
        let mut subscriber = state.hub.subscribe();
        let app = router(state.clone());

        let response = app
            .oneshot(post_mcp(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(body_string(response).await.is_empty());
        assert!(subscriber.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sse_stream_sends_connected_then_broadcasts() {
        let state = state(FakeDatabase::new());
        let app = router(state.clone());

        let request = Request::builder().uri("/sse").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(state.hub.len(), 1);

        assert_eq!(state.hub.broadcast(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#), 1);
        state.hub.close_all();

        let body = body_string(response).await;
        let events: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .collect();
        assert_eq!(events.len(), 2);

        let connected: serde_json::Value = serde_json::from_str(events[0]).unwrap();
        assert_eq!(connected["event"], "connected");
        assert!(connected["clientId"].is_string());
        assert_eq!(events[1], r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
    }

    #[tokio::test]
    async fn test_bind_serve_and_shutdown() {
        let settings = HttpSettings {
            addr: "127.0.0.1:0".to_string(),
            subscriber_buffer: 4,
            keep_alive: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(2),
        };
        let server = state(FakeDatabase::new()).server;
        let transport = HttpTransport::bind(&settings, server).await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(transport.local_addr())
            .await
            .unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with(HEALTH_BODY));

        let hub = Arc::clone(transport.hub());
        let mut subscriber = hub.subscribe();
        transport.shutdown().await;
        assert_eq!(subscriber.recv().await, None);
    }
}
