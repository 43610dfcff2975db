use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use dataproxy_sdk::api::ErrorSource;
use dataproxy_sdk::body::{Body, BodyStream, BoxError};
use dataproxy_sdk::{
    ClientIp, CloudMetricsHandler, DataSource, DataSourceKind, DataSourceResolver,
    SecurityContext, TokenProvider,
};
use futures_util::StreamExt;
use http::HeaderValue;
use tracing::{debug, info, warn};

use super::{director, headers, transport};
use crate::domain::allow_list::AllowList;
use crate::domain::auth;
use crate::domain::error::DomainError;
use crate::domain::model::{ProxyRequest, Target};
use crate::domain::services::DataPlaneService;

/// Data Plane service implementation: resolution, guarding, credential
/// injection and forwarding.
pub struct DataPlaneServiceImpl {
    resolver: Arc<dyn DataSourceResolver>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cloud_metrics: Option<Arc<dyn CloudMetricsHandler>>,
    allow_list: Arc<AllowList>,
    http_client: reqwest::Client,
    request_timeout: Duration,
    flush_interval: Duration,
    max_body_size: usize,
}

impl DataPlaneServiceImpl {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn DataSourceResolver>,
        allow_list: Arc<AllowList>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            resolver,
            token_provider: None,
            cloud_metrics: None,
            allow_list,
            http_client,
            request_timeout: Duration::from_secs(30),
            flush_interval: Duration::from_millis(200),
            max_body_size: 10 * 1024 * 1024,
        }
    }

    #[must_use]
    pub fn with_token_provider(mut self, provider: Option<Arc<dyn TokenProvider>>) -> Self {
        self.token_provider = provider;
        self
    }

    #[must_use]
    pub fn with_cloud_metrics(mut self, handler: Option<Arc<dyn CloudMetricsHandler>>) -> Self {
        self.cloud_metrics = handler;
        self
    }

    /// Override the response-header timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    async fn delegate_cloud_metrics(
        &self,
        ctx: &SecurityContext,
        ds: &DataSource,
        req: http::Request<Body>,
        instance: &str,
    ) -> Result<http::Response<Body>, DomainError> {
        let handler = self
            .cloud_metrics
            .as_ref()
            .ok_or_else(|| DomainError::Internal {
                detail: format!("no cloud metrics handler registered for data source {}", ds.id),
                instance: instance.to_owned(),
            })?;

        let mut resp = handler.handle(ctx, ds, req).await?;
        if resp.extensions().get::<ErrorSource>().is_none() {
            resp.extensions_mut().insert(ErrorSource::Upstream);
        }
        Ok(resp)
    }

    async fn acquire_token(
        &self,
        ctx: &SecurityContext,
        ds: &DataSource,
        instance: &str,
    ) -> Result<HeaderValue, DomainError> {
        let failed = |detail: String| DomainError::TokenAcquisition {
            detail,
            instance: instance.to_owned(),
        };

        let provider = self
            .token_provider
            .as_ref()
            .ok_or_else(|| failed("no token provider registered".to_owned()))?;
        let token = provider
            .token(ctx, ds)
            .await
            .map_err(|e| failed(e.to_string()))?;

        HeaderValue::from_str(token.expose())
            .map_err(|_| failed("token is not a valid header value".to_owned()))
    }

    async fn read_request(
        &self,
        req: http::Request<Body>,
        instance: &str,
    ) -> Result<ProxyRequest, DomainError> {
        let (parts, body) = req.into_parts();

        let mut proxy_req = ProxyRequest::new(parts.method, parts.uri.path());
        if proxy_req.has_parent_segment() {
            return Err(DomainError::Validation {
                detail: "proxy path must not contain '..' segments".into(),
                instance: instance.to_owned(),
            });
        }
        let body = collect_body(body, self.max_body_size, instance).await?;

        proxy_req.query = parts.uri.query().unwrap_or_default().to_owned();
        proxy_req.headers = parts.headers;
        proxy_req.body = body;
        proxy_req.client_ip = parts.extensions.get::<ClientIp>().map(|ip| ip.0);
        Ok(proxy_req)
    }

    async fn forward(
        &self,
        ds: &DataSource,
        proxy_req: ProxyRequest,
        outbound: director::Outbound,
        instance: &str,
    ) -> Result<http::Response<Body>, DomainError> {
        let url = outbound.url;
        info!(
            data_source_id = ds.id,
            url = %director::redacted_url(&url),
            "Proxying call"
        );

        let send_future = self
            .http_client
            .request(proxy_req.method, url)
            .headers(outbound.headers)
            .body(proxy_req.body)
            .send();

        let timeout = self.request_timeout;
        let response = tokio::time::timeout(timeout, send_future)
            .await
            .map_err(|_| DomainError::RequestTimeout {
                detail: format!(
                    "data source {} did not respond within {timeout:?}",
                    ds.id
                ),
                instance: instance.to_owned(),
            })?
            .map_err(|e| transport_error(&e, instance))?;

        let status = response.status();
        let mut resp_headers = response.headers().clone();
        headers::sanitize_response_headers(&mut resp_headers);

        let body_stream: BodyStream = Box::pin(
            response
                .bytes_stream()
                .map(|r| r.map_err(|e| Box::new(e) as BoxError)),
        );
        let body_stream = transport::flushing_stream(body_stream, self.flush_interval);

        let mut resp = http::Response::builder()
            .status(status)
            .body(Body::Stream(body_stream))
            .map_err(|e| DomainError::DownstreamError {
                detail: format!("failed to build response: {e}"),
                instance: instance.to_owned(),
            })?;

        *resp.headers_mut() = resp_headers;
        resp.extensions_mut().insert(ErrorSource::Upstream);

        Ok(resp)
    }
}

/// Buffer a request body, giving up as soon as it grows past `max_body_size`.
async fn collect_body(
    body: Body,
    max_body_size: usize,
    instance: &str,
) -> Result<Bytes, DomainError> {
    let too_large = || DomainError::PayloadTooLarge {
        detail: format!("request body exceeds maximum of {max_body_size} bytes"),
        instance: instance.to_owned(),
    };

    match body {
        Body::Empty => Ok(Bytes::new()),
        Body::Bytes(bytes) if bytes.len() > max_body_size => Err(too_large()),
        Body::Bytes(bytes) => Ok(bytes),
        Body::Stream(mut stream) => {
            let mut buf = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| DomainError::Validation {
                    detail: format!("failed to read request body: {e}"),
                    instance: instance.to_owned(),
                })?;
                if buf.len() + chunk.len() > max_body_size {
                    return Err(too_large());
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(buf.freeze())
        }
    }
}

fn transport_error(e: &reqwest::Error, instance: &str) -> DomainError {
    if e.is_timeout() {
        DomainError::RequestTimeout {
            detail: e.to_string(),
            instance: instance.to_owned(),
        }
    } else if e.is_connect() {
        DomainError::ConnectionFailed {
            detail: e.to_string(),
            instance: instance.to_owned(),
        }
    } else {
        DomainError::DownstreamError {
            detail: e.to_string(),
            instance: instance.to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl DataPlaneService for DataPlaneServiceImpl {
    async fn proxy_request(
        &self,
        ctx: SecurityContext,
        data_source_id: i64,
        req: http::Request<Body>,
    ) -> Result<http::Response<Body>, DomainError> {
        let started = Instant::now();
        let instance = format!("/datasources/{data_source_id}{}", req.uri().path());

        // 1. Resolve.
        let ds = self
            .resolver
            .resolve(&ctx, data_source_id)
            .await
            .map_err(|e| DomainError::DataSourceUnavailable {
                detail: e.to_string(),
                instance: instance.clone(),
            })?;

        // 2. Cloud metrics sources bypass the generic proxy entirely.
        if ds.kind == DataSourceKind::CloudMetrics {
            return self
                .delegate_cloud_metrics(&ctx, &ds, req, &instance)
                .await;
        }

        // 3. Guard.
        let target = Target::parse(&ds.url, &instance)?;
        let authority = target.authority();
        if !self.allow_list.is_allowed(&authority) {
            warn!(
                data_source_id = ds.id,
                host = %authority,
                "Target host rejected by allow-list"
            );
            return Err(DomainError::ForbiddenTarget {
                host: authority,
                instance,
            });
        }

        // 4. Token.
        let token = if ds.token_auth_enabled() {
            Some(self.acquire_token(&ctx, &ds, &instance).await?)
        } else {
            None
        };

        // 5. Plan and rewrite.
        let proxy_req = self.read_request(req, &instance).await?;
        let plan = auth::build_rewrite_plan(&ds, target, &proxy_req, token.as_ref());
        debug!(
            data_source_id = ds.id,
            kind = %ds.kind,
            path = %plan.path,
            removed = ?plan.remove_headers,
            set = ?plan.set_headers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            "Rewrite plan computed"
        );
        let outbound = director::direct(&plan, &proxy_req.headers, proxy_req.client_ip, &instance)?;

        // 6. Forward.
        let result = self.forward(&ds, proxy_req, outbound, &instance).await;
        match &result {
            Ok(resp) => info!(
                data_source_id = ds.id,
                status = resp.status().as_u16(),
                elapsed = ?started.elapsed(),
                "Data source responded"
            ),
            Err(e) => warn!(
                data_source_id = ds.id,
                error = %e,
                elapsed = ?started.elapsed(),
                "Data source request failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use dataproxy_sdk::{DataSourceKind, ResolveError};

    use super::*;

    struct FixedResolver(DataSource);

    #[async_trait::async_trait]
    impl DataSourceResolver for FixedResolver {
        async fn resolve(
            &self,
            _ctx: &SecurityContext,
            id: i64,
        ) -> Result<DataSource, ResolveError> {
            if id == self.0.id {
                Ok(self.0.clone())
            } else {
                Err(ResolveError::NotFound { id })
            }
        }
    }

    fn service(ds: DataSource, allow: &[&str]) -> DataPlaneServiceImpl {
        DataPlaneServiceImpl::new(
            Arc::new(FixedResolver(ds)),
            Arc::new(AllowList::new(allow.iter().copied())),
            reqwest::Client::new(),
        )
    }

    fn get(uri: &str) -> http::Request<Body> {
        http::Request::builder().uri(uri).body(Body::Empty).unwrap()
    }

    #[tokio::test]
    async fn unknown_data_source_is_unavailable() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://graphite"),
            &[],
        );
        let err = svc
            .proxy_request(SecurityContext::new(1), 2, get("/render"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to load datasource meta data: data source 2 not found"
        );
        assert_eq!(err.instance(), "/datasources/2/render");
    }

    #[tokio::test]
    async fn host_outside_allow_list_is_forbidden() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://graphite"),
            &["influx:8086"],
        );
        let err = svc
            .proxy_request(SecurityContext::new(1), 1, get("/render"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ForbiddenTarget { ref host, .. } if host == "graphite"));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_forwarding() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "graphite without scheme"),
            &[],
        );
        let err = svc
            .proxy_request(SecurityContext::new(1), 1, get("/"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidDataSource { .. }));
    }

    #[tokio::test]
    async fn token_auth_without_provider_fails() {
        let ds = DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://swift:8080")
            .with_setting(dataproxy_sdk::models::TOKEN_AUTH_SETTING, serde_json::json!(true));
        let err = service(ds, &[])
            .proxy_request(SecurityContext::new(1), 1, get("/v1/objects"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get auth token: no token provider registered"
        );
    }

    #[tokio::test]
    async fn cloud_metrics_without_handler_is_internal() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::CloudMetrics, "https://monitoring"),
            &[],
        );
        let err = svc
            .proxy_request(SecurityContext::new(1), 1, get("/"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal { .. }));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://graphite"),
            &[],
        )
        .with_max_body_size(4);
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri("/render")
            .body(Body::from("target=cpu"))
            .unwrap();
        let err = svc
            .proxy_request(SecurityContext::new(1), 1, req)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn endless_streamed_body_stops_at_limit() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://graphite"),
            &[],
        )
        .with_max_body_size(1024);
        let endless: BodyStream = Box::pin(futures_util::stream::repeat_with(|| {
            Ok::<_, BoxError>(Bytes::from_static(b"0123456789abcdef"))
        }));
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri("/write")
            .body(Body::Stream(endless))
            .unwrap();

        let err = svc
            .proxy_request(SecurityContext::new(1), 1, req)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn streamed_body_within_limit_is_buffered() {
        let chunks: Vec<Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from("cpu value=1\n")), Ok(Bytes::from("mem value=2\n"))];
        let body = Body::Stream(Box::pin(futures_util::stream::iter(chunks)));
        let bytes = collect_body(body, 24, "/datasources/1/write").await.unwrap();
        assert_eq!(bytes, "cpu value=1\nmem value=2\n");
    }

    #[tokio::test]
    async fn parent_segment_in_proxy_path_is_rejected() {
        let svc = service(
            DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://prom:9090/tenant-a/"),
            &[],
        );
        for uri in ["/../tenant-b/api", "/api/%2E%2e/%2e%2e/tenant-b"] {
            let err = svc
                .proxy_request(SecurityContext::new(1), 1, get(uri))
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation { .. }), "{uri}: {err}");
        }
    }
}
