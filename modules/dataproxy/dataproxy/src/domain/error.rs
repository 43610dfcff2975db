use dataproxy_sdk::DataProxyError;

/// Domain-layer errors of the proxy pipeline.
///
/// Every variant is proxy-originated: a backend that answered, with any status,
/// is not an error.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{detail}")]
    Validation { detail: String, instance: String },

    #[error("Unable to load datasource meta data: {detail}")]
    DataSourceUnavailable { detail: String, instance: String },

    #[error("Invalid data source url: {detail}")]
    InvalidDataSource { detail: String, instance: String },

    #[error("Data proxy hostname and ip are not included in whitelist")]
    ForbiddenTarget { host: String, instance: String },

    #[error("Failed to get auth token: {detail}")]
    TokenAcquisition { detail: String, instance: String },

    #[error("{detail}")]
    PayloadTooLarge { detail: String, instance: String },

    #[error("{detail}")]
    DownstreamError { detail: String, instance: String },

    #[error("{detail}")]
    ConnectionFailed { detail: String, instance: String },

    #[error("{detail}")]
    RequestTimeout { detail: String, instance: String },

    #[error("internal: {detail}")]
    Internal { detail: String, instance: String },

    /// Failure reported by a delegated handler, surfaced unchanged.
    #[error(transparent)]
    Delegated(#[from] DataProxyError),
}

impl DomainError {
    #[must_use]
    pub fn instance(&self) -> &str {
        match self {
            Self::Validation { instance, .. }
            | Self::DataSourceUnavailable { instance, .. }
            | Self::InvalidDataSource { instance, .. }
            | Self::ForbiddenTarget { instance, .. }
            | Self::TokenAcquisition { instance, .. }
            | Self::PayloadTooLarge { instance, .. }
            | Self::DownstreamError { instance, .. }
            | Self::ConnectionFailed { instance, .. }
            | Self::RequestTimeout { instance, .. }
            | Self::Internal { instance, .. } => instance,
            Self::Delegated(inner) => delegated_instance(inner),
        }
    }
}

impl From<DomainError> for DataProxyError {
    fn from(e: DomainError) -> Self {
        let detail = e.to_string();
        let instance = e.instance().to_owned();
        match e {
            DomainError::Validation { .. } => Self::ValidationError { detail, instance },
            DomainError::DataSourceUnavailable { .. } => {
                Self::DataSourceUnavailable { detail, instance }
            }
            DomainError::InvalidDataSource { .. } => Self::InvalidDataSource { detail, instance },
            DomainError::ForbiddenTarget { .. } => Self::ForbiddenTarget { detail, instance },
            DomainError::TokenAcquisition { .. } => Self::TokenAcquisition { detail, instance },
            DomainError::PayloadTooLarge { .. } => Self::PayloadTooLarge { detail, instance },
            DomainError::DownstreamError { .. } => Self::DownstreamError { detail, instance },
            DomainError::ConnectionFailed { .. } => Self::ConnectionFailed { detail, instance },
            DomainError::RequestTimeout { .. } => Self::RequestTimeout { detail, instance },
            DomainError::Internal { .. } => Self::Internal { detail, instance },
            DomainError::Delegated(inner) => inner,
        }
    }
}

fn delegated_instance(err: &DataProxyError) -> &str {
    match err {
        DataProxyError::ValidationError { instance, .. }
        | DataProxyError::DataSourceUnavailable { instance, .. }
        | DataProxyError::InvalidDataSource { instance, .. }
        | DataProxyError::ForbiddenTarget { instance, .. }
        | DataProxyError::TokenAcquisition { instance, .. }
        | DataProxyError::PayloadTooLarge { instance, .. }
        | DataProxyError::DownstreamError { instance, .. }
        | DataProxyError::ConnectionFailed { instance, .. }
        | DataProxyError::RequestTimeout { instance, .. }
        | DataProxyError::Internal { instance, .. } => instance,
    }
}
