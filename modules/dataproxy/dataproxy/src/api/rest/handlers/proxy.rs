use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Extension, Path, Request};
use axum::response::Response;
use dataproxy_sdk::api::ErrorSource;
use dataproxy_sdk::{ClientIp, SecurityContext};
use http::HeaderValue;
use serde::Deserialize;

use crate::api::rest::error::{ERROR_SOURCE_HEADER, error_response};
use crate::domain::error::DomainError;
use crate::infra::proxy::headers;
use crate::module::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub id: i64,
}

/// Proxy handler for `/datasources/{id}` and `/datasources/{id}/{*proxy_path}`.
///
/// Buffers the body, rewrites the URI to `/{proxy_path}?{query}` and hands
/// the request to the Data Plane service. The backend response is streamed back.
pub async fn proxy_handler(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SecurityContext>,
    Path(ProxyParams { id }): Path<ProxyParams>,
    req: Request,
) -> Result<Response, Response> {
    let max_body_size = state.max_body_size;
    let (mut parts, body) = req.into_parts();
    let path = parts.uri.path().to_owned();
    let instance = path.clone();

    // Reject early when Content-Length already exceeds the limit.
    if let Some(cl) = parts.headers.get(http::header::CONTENT_LENGTH) {
        let cl_val: usize = cl
            .to_str()
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                error_response(DomainError::Validation {
                    detail: "invalid Content-Length header".into(),
                    instance: instance.clone(),
                })
            })?;
        if cl_val > max_body_size {
            return Err(error_response(DomainError::PayloadTooLarge {
                detail: format!(
                    "request body of {cl_val} bytes exceeds maximum of {max_body_size} bytes"
                ),
                instance,
            }));
        }
    }

    let body_bytes = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|_| {
            error_response(DomainError::PayloadTooLarge {
                detail: format!("request body exceeds maximum of {max_body_size} bytes"),
                instance: instance.clone(),
            })
        })?;

    let proxy_path = proxy_path_of(&path);
    let new_uri = match parts.uri.query() {
        Some(query) => format!("/{proxy_path}?{query}"),
        None => format!("/{proxy_path}"),
    };
    parts.uri = new_uri.parse().map_err(|_| {
        error_response(DomainError::Validation {
            detail: "failed to parse proxy URI".into(),
            instance: instance.clone(),
        })
    })?;

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>().copied() {
        parts.extensions.insert(ClientIp(addr.ip()));
    }

    let proxy_req = http::Request::from_parts(parts, dataproxy_sdk::Body::from(body_bytes));

    let proxy_resp = state
        .dp
        .proxy_request(ctx, id, proxy_req)
        .await
        .map_err(error_response)?;

    let (resp_parts, sdk_body) = proxy_resp.into_parts();

    let error_source = resp_parts
        .extensions
        .get::<ErrorSource>()
        .copied()
        .unwrap_or(ErrorSource::Upstream);

    // Delegated handlers bypass the data plane sanitizer.
    let mut resp_headers = resp_parts.headers;
    headers::sanitize_response_headers(&mut resp_headers);

    let mut response = Response::new(Body::from_stream(sdk_body.into_stream()));
    *response.status_mut() = resp_parts.status;
    *response.headers_mut() = resp_headers;
    response.headers_mut().insert(
        ERROR_SOURCE_HEADER,
        HeaderValue::from_static(error_source.as_str()),
    );

    Ok(response)
}

/// Everything after `/datasources/{id}/`, or empty when there is no trailing path.
fn proxy_path_of(path: &str) -> &str {
    let rest = path.trim_start_matches('/');
    let rest = rest.strip_prefix("datasources/").unwrap_or(rest);
    match rest.find('/') {
        Some(pos) => &rest[pos + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::proxy_path_of;

    #[test]
    fn proxy_path_after_id() {
        assert_eq!(
            proxy_path_of("/datasources/7/api/v1/query_range"),
            "api/v1/query_range"
        );
    }

    #[test]
    fn proxy_path_empty_without_suffix() {
        assert_eq!(proxy_path_of("/datasources/7"), "");
        assert_eq!(proxy_path_of("/datasources/7/"), "");
    }

    #[test]
    fn proxy_path_keeps_encoding() {
        assert_eq!(
            proxy_path_of("/datasources/3/render%20now/x"),
            "render%20now/x"
        );
    }
}
