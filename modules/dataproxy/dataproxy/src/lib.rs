// === PUBLIC API (from SDK) ===
pub use dataproxy_sdk::{
    Body, ClientIp, CloudMetricsHandler, DataProxyClientV1, DataProxyError, DataSource,
    DataSourceKind, DataSourceResolver, ErrorSource, ResolveError, SecretValue, SecurityContext,
    TokenError, TokenProvider,
};

// === MODULE DEFINITION ===
pub mod module;
pub use module::{DataProxyModule, DataProxyModuleBuilder};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod api;
pub mod config;
pub(crate) mod domain;
pub(crate) mod infra;

pub use config::{DataProxyConfig, TransportConfig};
pub use infra::storage::InMemoryDataSourceRepo;
pub use infra::token::StaticTokenProvider;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
