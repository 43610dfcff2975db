use std::net::IpAddr;

use crate::body::Body;
use crate::error::DataProxyError;
use crate::models::{DataSource, SecretValue, SecurityContext};

// ---------------------------------------------------------------------------
// Proxy types
// ---------------------------------------------------------------------------

/// Distinguishes proxy-originated responses from backend-originated ones.
///
/// Available on proxy responses via `resp.extensions().get::<ErrorSource>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Gateway,
    Upstream,
}

impl ErrorSource {
    /// Lowercase form used in the `x-dataproxy-error-source` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Upstream => "upstream",
        }
    }
}

/// Address of the original caller, appended to `X-Forwarded-For` when present.
///
/// Set on the request extensions by the REST handler; in-process callers may set it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("data source {id} not found")]
    NotFound { id: i64 },
    #[error("data source lookup failed: {0}")]
    Unavailable(String),
}

/// Looks up the stored configuration of a data source within the caller's organization.
#[async_trait::async_trait]
pub trait DataSourceResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` when the id is unknown in the caller's
    /// organization, `ResolveError::Unavailable` when the lookup itself fails.
    async fn resolve(&self, ctx: &SecurityContext, id: i64) -> Result<DataSource, ResolveError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("token service unavailable: {0}")]
    Unavailable(String),
    #[error("token request rejected: {0}")]
    Rejected(String),
}

/// Issues service tokens for data sources that enable token auth.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `TokenError` when no token can be issued for this caller.
    async fn token(
        &self,
        ctx: &SecurityContext,
        data_source: &DataSource,
    ) -> Result<SecretValue, TokenError>;
}

/// Serves cloud-metrics data sources end to end, bypassing the generic proxy.
///
/// The request URI holds the proxy path and the caller's query string.
#[async_trait::async_trait]
pub trait CloudMetricsHandler: Send + Sync {
    /// # Errors
    ///
    /// Returns `DataProxyError` for failures the handler reports itself.
    async fn handle(
        &self,
        ctx: &SecurityContext,
        data_source: &DataSource,
        req: http::Request<Body>,
    ) -> Result<http::Response<Body>, DataProxyError>;
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Public API of the data proxy (Version 1), for in-process callers.
#[async_trait::async_trait]
pub trait DataProxyClientV1: Send + Sync {
    /// Resolve the data source, rewrite the request for it and forward it.
    ///
    /// The request URI is the proxy path plus query, e.g. `/query?q=SELECT%201`.
    /// A backend response of any status is returned as `Ok`; `ErrorSource` is
    /// available on the response extensions.
    ///
    /// # Errors
    ///
    /// Returns `DataProxyError` when the proxy itself rejects or fails the request.
    async fn proxy_request(
        &self,
        ctx: SecurityContext,
        data_source_id: i64,
        req: http::Request<Body>,
    ) -> Result<http::Response<Body>, DataProxyError>;
}
