use std::sync::Arc;

use dataproxy_sdk::{Body, DataProxyClientV1, DataProxyError, SecurityContext};

use super::DataPlaneService;

/// Implements the public `DataProxyClientV1` trait on top of the data plane.
pub(crate) struct DataProxyClientV1Facade {
    dp: Arc<dyn DataPlaneService>,
}

impl DataProxyClientV1Facade {
    pub(crate) fn new(dp: Arc<dyn DataPlaneService>) -> Self {
        Self { dp }
    }
}

#[async_trait::async_trait]
impl DataProxyClientV1 for DataProxyClientV1Facade {
    async fn proxy_request(
        &self,
        ctx: SecurityContext,
        data_source_id: i64,
        req: http::Request<Body>,
    ) -> Result<http::Response<Body>, DataProxyError> {
        self.dp
            .proxy_request(ctx, data_source_id, req)
            .await
            .map_err(DataProxyError::from)
    }
}
