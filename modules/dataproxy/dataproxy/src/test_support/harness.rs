//! Top-level test harness that wires the module against test collaborators.

use std::sync::Arc;
use std::time::Duration;

use dataproxy_sdk::{
    CloudMetricsHandler, DataProxyClientV1, DataSource, SecretValue, SecurityContext,
    TokenProvider,
};
use http::Method;

use super::request::RequestCase;
use crate::api::rest::routes::test_router;
use crate::config::DataProxyConfig;
use crate::module::DataProxyModule;

/// Organization used by the harness security context.
pub const TEST_ORG_ID: i64 = 1;

/// Fully-wired test environment: facade plus router with a fixed security context.
pub struct AppHarness {
    client: Arc<dyn DataProxyClientV1>,
    ctx: SecurityContext,
    router: axum::Router,
}

impl AppHarness {
    pub fn builder() -> AppHarnessBuilder {
        AppHarnessBuilder::default()
    }

    pub fn client(&self) -> &dyn DataProxyClientV1 {
        &*self.client
    }

    pub fn security_context(&self) -> &SecurityContext {
        &self.ctx
    }

    pub(crate) fn router(&self) -> &axum::Router {
        &self.router
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestCase<'_> {
        RequestCase::new(self, method, path)
    }

    pub fn get(&self, path: impl Into<String>) -> RequestCase<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> RequestCase<'_> {
        self.request(Method::POST, path)
    }
}

/// Builder for [`AppHarness`].
///
/// Defaults: empty allow-list, TLS verification skipped, flushing disabled so
/// tests see backend chunks as they arrive.
pub struct AppHarnessBuilder {
    config: DataProxyConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cloud_metrics: Option<Arc<dyn CloudMetricsHandler>>,
}

impl Default for AppHarnessBuilder {
    fn default() -> Self {
        let mut config = DataProxyConfig::default();
        config.transport.flush_interval_ms = 0;
        Self {
            config,
            token_provider: None,
            cloud_metrics: None,
        }
    }
}

impl AppHarnessBuilder {
    pub fn with_data_source(mut self, ds: DataSource) -> Self {
        self.config.data_sources.push(ds);
        self
    }

    pub fn with_allow_list(mut self, hosts: Vec<String>) -> Self {
        self.config.allow_list = hosts;
        self
    }

    pub fn with_service_token(mut self, token: &str) -> Self {
        self.config.service_token = Some(SecretValue::new(token));
        self
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_cloud_metrics_handler(mut self, handler: Arc<dyn CloudMetricsHandler>) -> Self {
        self.cloud_metrics = Some(handler);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.config.transport.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap();
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size_bytes = bytes;
        self
    }

    pub fn build(self) -> AppHarness {
        let mut builder = DataProxyModule::builder(self.config);
        if let Some(provider) = self.token_provider {
            builder = builder.with_token_provider(provider);
        }
        if let Some(handler) = self.cloud_metrics {
            builder = builder.with_cloud_metrics_handler(handler);
        }
        let module = builder.build().expect("failed to build data proxy module");

        let ctx = SecurityContext::new(TEST_ORG_ID).with_subject("test-user");
        let router = test_router(module.state(), ctx.clone());

        AppHarness {
            client: module.client(),
            ctx,
            router,
        }
    }
}
