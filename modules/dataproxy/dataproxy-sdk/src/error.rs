/// Proxy-originated error with everything needed to produce a Problem Details response.
///
/// Backend failures that come with an HTTP response are not errors: they are
/// returned to the caller verbatim as a normal response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataProxyError {
    #[error("{detail}")]
    ValidationError { detail: String, instance: String },

    #[error("{detail}")]
    DataSourceUnavailable { detail: String, instance: String },

    #[error("{detail}")]
    InvalidDataSource { detail: String, instance: String },

    #[error("{detail}")]
    ForbiddenTarget { detail: String, instance: String },

    #[error("{detail}")]
    TokenAcquisition { detail: String, instance: String },

    #[error("{detail}")]
    PayloadTooLarge { detail: String, instance: String },

    #[error("{detail}")]
    DownstreamError { detail: String, instance: String },

    #[error("{detail}")]
    ConnectionFailed { detail: String, instance: String },

    #[error("{detail}")]
    RequestTimeout { detail: String, instance: String },

    #[error("{detail}")]
    Internal { detail: String, instance: String },
}
