pub(crate) mod client;

pub(crate) use client::DataProxyClientV1Facade;

use dataproxy_sdk::{Body, SecurityContext};

use crate::domain::error::DomainError;

/// Internal Data Plane service trait: resolve, authorize, rewrite and forward.
#[async_trait::async_trait]
pub(crate) trait DataPlaneService: Send + Sync {
    /// The request URI carries the proxy path and the caller's query string.
    async fn proxy_request(
        &self,
        ctx: SecurityContext,
        data_source_id: i64,
        req: http::Request<Body>,
    ) -> Result<http::Response<Body>, DomainError>;
}
