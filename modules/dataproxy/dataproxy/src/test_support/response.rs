//! Collected router responses with proxy-specific assertions.

use axum::body::Body;
use dataproxy_sdk::api::ErrorSource;
use http::StatusCode;
use http::header::HeaderMap;
use serde_json::Value;

use crate::api::rest::error::ERROR_SOURCE_HEADER;

/// A router response with its body fully read.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    pub async fn from_response(resp: http::Response<Body>) -> Self {
        let (parts, body) = resp.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("failed to read response body")
            .to_vec();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&self.body),
        );
        self
    }

    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .headers
            .get(name)
            .map(|v| v.to_str().expect("header is not valid UTF-8"));
        assert_eq!(actual, Some(expected), "header '{name}'");
        self
    }

    /// Whether the proxy or the backend produced this response.
    pub fn assert_error_source(&self, source: ErrorSource) -> &Self {
        self.assert_header(ERROR_SOURCE_HEADER.as_str(), source.as_str())
    }

    /// Assert a problem-details body with the given status and `detail`.
    pub fn assert_problem(&self, status: u16, detail: &str) -> &Self {
        self.assert_status(status)
            .assert_header("content-type", "application/problem+json")
            .assert_error_source(ErrorSource::Gateway);
        let problem = self.json();
        assert_eq!(problem["status"], status);
        assert_eq!(problem["detail"], detail);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body is not valid UTF-8")
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not valid JSON")
    }
}
