pub mod api;
pub mod body;
pub mod error;

pub mod models;

pub use models::{DataSource, DataSourceKind, SecretValue, SecurityContext};

pub use api::{
    ClientIp, CloudMetricsHandler, DataProxyClientV1, DataSourceResolver, ErrorSource,
    ResolveError, TokenError, TokenProvider,
};
pub use body::Body;
pub use error::DataProxyError;
