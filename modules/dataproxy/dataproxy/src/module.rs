use std::sync::Arc;

use dataproxy_sdk::{CloudMetricsHandler, DataProxyClientV1, DataSourceResolver, TokenProvider};
use tracing::info;

use crate::api::rest::routes;
use crate::config::DataProxyConfig;
use crate::domain::allow_list::AllowList;
use crate::domain::services::{DataPlaneService, DataProxyClientV1Facade};
use crate::infra::proxy::{DataPlaneServiceImpl, transport};
use crate::infra::storage::InMemoryDataSourceRepo;
use crate::infra::token::StaticTokenProvider;

/// Shared application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) dp: Arc<dyn DataPlaneService>,
    pub(crate) max_body_size: usize,
}

/// Data proxy module: owns the wired data plane and exposes it as an axum
/// router and as an in-process client.
pub struct DataProxyModule {
    state: AppState,
    client: Arc<dyn DataProxyClientV1>,
}

impl DataProxyModule {
    #[must_use]
    pub fn builder(config: DataProxyConfig) -> DataProxyModuleBuilder {
        DataProxyModuleBuilder::new(config)
    }

    /// Routes under `/datasources/{id}`. Expects a `SecurityContext` request extension.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn DataProxyClientV1> {
        Arc::clone(&self.client)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn state(&self) -> AppState {
        self.state.clone()
    }
}

/// Builder for [`DataProxyModule`].
///
/// Collaborators not supplied fall back to the development implementations
/// seeded from the configuration.
pub struct DataProxyModuleBuilder {
    config: DataProxyConfig,
    resolver: Option<Arc<dyn DataSourceResolver>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cloud_metrics: Option<Arc<dyn CloudMetricsHandler>>,
}

impl DataProxyModuleBuilder {
    #[must_use]
    pub fn new(config: DataProxyConfig) -> Self {
        Self {
            config,
            resolver: None,
            token_provider: None,
            cloud_metrics: None,
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DataSourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_cloud_metrics_handler(mut self, handler: Arc<dyn CloudMetricsHandler>) -> Self {
        self.cloud_metrics = Some(handler);
        self
    }

    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn build(self) -> anyhow::Result<DataProxyModule> {
        info!("Initializing data proxy module");
        let cfg = self.config;

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => {
                info!(
                    count = cfg.data_sources.len(),
                    "Seeding in-memory data source store"
                );
                Arc::new(InMemoryDataSourceRepo::with_data_sources(
                    cfg.data_sources.iter().cloned(),
                ))
            }
        };

        let token_provider = self.token_provider.unwrap_or_else(|| {
            Arc::new(StaticTokenProvider::new(cfg.service_token.clone())) as Arc<dyn TokenProvider>
        });

        let allow_list = Arc::new(AllowList::new(cfg.allow_list.iter().cloned()));
        if allow_list.is_empty() {
            info!("Data proxy allow-list is empty, every target host is permitted");
        }

        let http_client = transport::build_client(&cfg.transport)?;

        let dp: Arc<dyn DataPlaneService> = Arc::new(
            DataPlaneServiceImpl::new(resolver, allow_list, http_client)
                .with_token_provider(Some(token_provider))
                .with_cloud_metrics(self.cloud_metrics)
                .with_request_timeout(cfg.transport.request_timeout())
                .with_flush_interval(cfg.transport.flush_interval())
                .with_max_body_size(cfg.max_body_size_bytes),
        );

        let client: Arc<dyn DataProxyClientV1> =
            Arc::new(DataProxyClientV1Facade::new(Arc::clone(&dp)));

        info!(
            allow_list_entries = cfg.allow_list.len(),
            max_body_size_bytes = cfg.max_body_size_bytes,
            request_timeout_secs = cfg.transport.request_timeout_secs,
            "Data proxy module initialized"
        );

        Ok(DataProxyModule {
            state: AppState {
                dp,
                max_body_size: cfg.max_body_size_bytes,
            },
            client,
        })
    }
}
