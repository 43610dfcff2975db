//! Mock data source backend for integration tests.
//!
//! Records every request it receives and answers from registered responses,
//! falling back to a small JSON echo of the request line.
//!
//! # Usage
//! ```ignore
//! let mock = MockUpstream::start().await;
//! mock.mock("/query", MockResponse::json(200, json!({"results": []})));
//! // Point a data source at mock.base_url()
//! let last = mock.last_request().await.unwrap();
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

// ---------------------------------------------------------------------------
// Mock responses
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum MockBody {
    Json(Value),
    Text(String),
    /// Chunks written one by one with `interval` between them.
    Chunks {
        parts: Vec<String>,
        interval: Duration,
    },
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: MockBody,
    /// Wait this long before sending response headers.
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: MockBody::Json(value),
            delay: None,
        }
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: MockBody::Text(text.into()),
            delay: None,
        }
    }

    pub fn chunked(parts: Vec<&str>, interval: Duration) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: MockBody::Chunks {
                parts: parts.into_iter().map(str::to_owned).collect(),
                interval,
            },
            delay: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn into_axum_response(self) -> Response {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut builder = Response::builder()
            .status(StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK));
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        let body = match self.body {
            MockBody::Json(value) => Body::from(value.to_string()),
            MockBody::Text(text) => Body::from(text),
            MockBody::Chunks { parts, interval } => Body::from_stream(async_stream::stream! {
                for (i, part) in parts.into_iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(interval).await;
                    }
                    yield Ok::<_, Infallible>(Bytes::from(part));
                }
            }),
        };
        builder.body(body).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// A captured backend request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path and query as received.
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or("")
    }

    /// Raw query string, empty if none.
    pub fn query(&self) -> &str {
        self.uri.split_once('?').map_or("", |(_, q)| q)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.query().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .count()
    }
}

struct SharedState {
    recorded: Mutex<Vec<RecordedRequest>>,
    routes: DashMap<String, MockResponse>,
}

impl SharedState {
    async fn record(&self, method: &str, uri: &str, headers: &HeaderMap, body: &[u8]) {
        let hdrs = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();
        self.recorded.lock().await.push(RecordedRequest {
            method: method.to_owned(),
            uri: uri.to_owned(),
            headers: hdrs,
            body: body.to_vec(),
        });
    }
}

// ---------------------------------------------------------------------------
// MockUpstream
// ---------------------------------------------------------------------------

/// A mock backend HTTP server bound to a random local port.
pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<SharedState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}

impl MockUpstream {
    /// Start the mock server on `127.0.0.1:0`.
    pub async fn start() -> Self {
        let state = Arc::new(SharedState {
            recorded: Mutex::new(Vec::new()),
            routes: DashMap::new(),
        });
        let app = Router::new()
            .fallback(record_and_respond)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock upstream");
        let addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock server error");
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `127.0.0.1:{port}`, the value an allow-list must contain.
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Register a response for requests whose path equals `path` (any method).
    pub fn mock(&self, path: &str, response: MockResponse) {
        self.state.routes.insert(path.to_owned(), response);
    }

    /// All recorded requests, oldest first.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.state.recorded.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<RecordedRequest> {
        self.state.recorded.lock().await.last().cloned()
    }
}

async fn record_and_respond(State(state): State<Arc<SharedState>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let uri = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);

    state
        .record(parts.method.as_str(), &uri, &parts.headers, &body)
        .await;

    let registered = state
        .routes
        .get(parts.uri.path())
        .map(|r| r.value().clone());
    match registered {
        Some(response) => response.into_axum_response().await,
        None => {
            MockResponse::json(
                200,
                json!({ "method": parts.method.as_str(), "uri": uri }),
            )
            .into_axum_response()
            .await
        }
    }
}
