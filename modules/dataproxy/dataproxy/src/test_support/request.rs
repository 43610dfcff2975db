//! Fluent request builder for integration tests.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use http::header::HeaderMap;
use http::{HeaderName, HeaderValue, Method};
use tower::ServiceExt;

use super::harness::AppHarness;
use super::response::TestResponse;

/// Fluent HTTP request builder tied to an [`AppHarness`].
pub struct RequestCase<'a> {
    harness: &'a AppHarness,
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Body>,
    client_addr: Option<SocketAddr>,
}

impl<'a> RequestCase<'a> {
    pub(crate) fn new(harness: &'a AppHarness, method: Method, path: impl Into<String>) -> Self {
        Self {
            harness,
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            client_addr: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Add a query parameter; it is form-urlencoded on send.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Simulate the peer address the server would see.
    pub fn from_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Send the request through the router and collect the response.
    pub async fn send(self) -> TestResponse {
        let uri = if self.query.is_empty() {
            self.path
        } else {
            let qs = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            format!("{}?{qs}", self.path)
        };

        let mut builder = http::Request::builder().method(self.method).uri(&uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(addr) = self.client_addr {
            builder = builder.extension(ConnectInfo(addr));
        }

        let body = self.body.unwrap_or_else(Body::empty);
        let request = builder.body(body).expect("failed to build request");

        let router = self.harness.router().clone();
        let response = router
            .oneshot(request)
            .await
            .expect("router returned error");

        TestResponse::from_response(response).await
    }

    /// Send and assert the expected status code.
    pub async fn expect_status(self, status: u16) -> TestResponse {
        let resp = self.send().await;
        resp.assert_status(status);
        resp
    }
}
