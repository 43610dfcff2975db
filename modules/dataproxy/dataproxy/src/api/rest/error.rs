use axum::response::{IntoResponse, Response};
use dataproxy_sdk::DataProxyError;
use dataproxy_sdk::api::ErrorSource;
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

use crate::domain::error::DomainError;

/// Response header telling callers whether an answer came from the proxy or the backend.
pub const ERROR_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-dataproxy-error-source");

const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

// ---------------------------------------------------------------------------
// Error type identifiers
// ---------------------------------------------------------------------------

pub(crate) const ERR_VALIDATION: &str = "urn:dataproxy:error:validation";
pub(crate) const ERR_DATASOURCE_UNAVAILABLE: &str = "urn:dataproxy:error:datasource.unavailable";
pub(crate) const ERR_INVALID_DATASOURCE: &str = "urn:dataproxy:error:datasource.invalid_url";
pub(crate) const ERR_FORBIDDEN_TARGET: &str = "urn:dataproxy:error:target.forbidden";
pub(crate) const ERR_TOKEN: &str = "urn:dataproxy:error:auth.token";
pub(crate) const ERR_PAYLOAD_TOO_LARGE: &str = "urn:dataproxy:error:payload.too_large";
pub(crate) const ERR_DOWNSTREAM: &str = "urn:dataproxy:error:downstream";
pub(crate) const ERR_CONNECTION: &str = "urn:dataproxy:error:downstream.connection";
pub(crate) const ERR_REQUEST_TIMEOUT: &str = "urn:dataproxy:error:timeout.request";
pub(crate) const ERR_INTERNAL: &str = "urn:dataproxy:error:internal";

/// RFC 7807 problem details body.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    pub detail: String,
    pub instance: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize problem details");
                Vec::new()
            }
        };
        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        response
    }
}

// ---------------------------------------------------------------------------
// DataProxyError -> Problem
// ---------------------------------------------------------------------------

fn classify(err: &DataProxyError) -> (StatusCode, &'static str, &'static str) {
    match err {
        DataProxyError::ValidationError { .. } => {
            (StatusCode::BAD_REQUEST, ERR_VALIDATION, "Validation Error")
        }
        DataProxyError::DataSourceUnavailable { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_DATASOURCE_UNAVAILABLE,
            "Data Source Unavailable",
        ),
        DataProxyError::InvalidDataSource { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INVALID_DATASOURCE,
            "Invalid Data Source",
        ),
        DataProxyError::ForbiddenTarget { .. } => {
            (StatusCode::FORBIDDEN, ERR_FORBIDDEN_TARGET, "Forbidden Target")
        }
        DataProxyError::TokenAcquisition { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_TOKEN,
            "Token Acquisition Failed",
        ),
        DataProxyError::PayloadTooLarge { .. } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            ERR_PAYLOAD_TOO_LARGE,
            "Payload Too Large",
        ),
        DataProxyError::DownstreamError { .. } => {
            (StatusCode::BAD_GATEWAY, ERR_DOWNSTREAM, "Downstream Error")
        }
        DataProxyError::ConnectionFailed { .. } => {
            (StatusCode::BAD_GATEWAY, ERR_CONNECTION, "Connection Failed")
        }
        DataProxyError::RequestTimeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            ERR_REQUEST_TIMEOUT,
            "Request Timeout",
        ),
        DataProxyError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INTERNAL,
            "Internal Error",
        ),
    }
}

impl From<DataProxyError> for Problem {
    fn from(err: DataProxyError) -> Self {
        let (status, type_url, title) = classify(&err);
        let (DataProxyError::ValidationError { detail, instance }
        | DataProxyError::DataSourceUnavailable { detail, instance }
        | DataProxyError::InvalidDataSource { detail, instance }
        | DataProxyError::ForbiddenTarget { detail, instance }
        | DataProxyError::TokenAcquisition { detail, instance }
        | DataProxyError::PayloadTooLarge { detail, instance }
        | DataProxyError::DownstreamError { detail, instance }
        | DataProxyError::ConnectionFailed { detail, instance }
        | DataProxyError::RequestTimeout { detail, instance }
        | DataProxyError::Internal { detail, instance }) = err;

        Self {
            type_url: type_url.to_owned(),
            title: title.to_owned(),
            status,
            detail,
            instance,
        }
    }
}

impl From<DomainError> for Problem {
    fn from(err: DomainError) -> Self {
        DataProxyError::from(err).into()
    }
}

// ---------------------------------------------------------------------------
// Convenience functions for handlers
// ---------------------------------------------------------------------------

/// Convert a `DomainError` into a problem response marked as gateway-originated.
pub fn error_response(err: DomainError) -> Response {
    problem_response(Problem::from(err))
}

pub(crate) fn problem_response(problem: Problem) -> Response {
    let mut response = problem.into_response();
    response.headers_mut().insert(
        ERROR_SOURCE_HEADER,
        HeaderValue::from_static(ErrorSource::Gateway.as_str()),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_failure_is_500_with_underlying_message() {
        let p = Problem::from(DomainError::DataSourceUnavailable {
            detail: "data source 9 not found".into(),
            instance: "/datasources/9/query".into(),
        });
        assert_eq!(p.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(p.type_url, ERR_DATASOURCE_UNAVAILABLE);
        assert_eq!(
            p.detail,
            "Unable to load datasource meta data: data source 9 not found"
        );
        assert_eq!(p.instance, "/datasources/9/query");
    }

    #[test]
    fn forbidden_target_is_403() {
        let p = Problem::from(DomainError::ForbiddenTarget {
            host: "10.0.0.1".into(),
            instance: "/datasources/1/".into(),
        });
        assert_eq!(p.status, StatusCode::FORBIDDEN);
        assert_eq!(
            p.detail,
            "Data proxy hostname and ip are not included in whitelist"
        );
    }

    #[test]
    fn transport_failures_map_to_gateway_statuses() {
        let cases = [
            (
                DomainError::ConnectionFailed {
                    detail: "connection refused".into(),
                    instance: String::new(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DomainError::DownstreamError {
                    detail: "broken pipe".into(),
                    instance: String::new(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DomainError::RequestTimeout {
                    detail: "no response headers".into(),
                    instance: String::new(),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                DomainError::PayloadTooLarge {
                    detail: "too big".into(),
                    instance: String::new(),
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(Problem::from(err).status, status);
        }
    }

    #[test]
    fn delegated_error_keeps_its_classification() {
        let p = Problem::from(DomainError::Delegated(DataProxyError::ValidationError {
            detail: "unknown metric namespace".into(),
            instance: "/datasources/3/".into(),
        }));
        assert_eq!(p.status, StatusCode::BAD_REQUEST);
        assert_eq!(p.detail, "unknown metric namespace");
    }

    #[test]
    fn problem_serializes_rfc7807_fields() {
        let p = Problem::from(DomainError::TokenAcquisition {
            detail: "token service unavailable: down".into(),
            instance: "/datasources/4/v1".into(),
        });
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], ERR_TOKEN);
        assert_eq!(json["status"], 500);
        assert_eq!(json["title"], "Token Acquisition Failed");
        assert_eq!(
            json["detail"],
            "Failed to get auth token: token service unavailable: down"
        );
        assert_eq!(json["instance"], "/datasources/4/v1");
    }

    #[test]
    fn error_response_sets_gateway_header_and_content_type() {
        let resp = error_response(DomainError::Internal {
            detail: "boom".into(),
            instance: String::new(),
        });
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers().get(&ERROR_SOURCE_HEADER).unwrap(), "gateway");
        assert_eq!(
            resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }
}
