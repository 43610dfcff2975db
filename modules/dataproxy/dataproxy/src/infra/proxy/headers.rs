use std::net::IpAddr;

use http::header::{CONTENT_LENGTH, HOST, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Header carrying the chain of client addresses seen by proxies.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Remove hop-by-hop headers that must not be forwarded.
///
/// Headers named in the `Connection` value are removed along with the static list.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Inbound headers minus everything that describes the inbound hop itself.
pub fn prepare_outbound(inbound: &HeaderMap) -> HeaderMap {
    let mut out = inbound.clone();
    strip_hop_by_hop(&mut out);
    out.remove(HOST);
    out.remove(CONTENT_LENGTH);
    out
}

/// Sanitize backend response headers before they reach the caller.
///
/// Backends must not be able to set cookies on the proxy's origin.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(SET_COOKIE);
}

/// Set the Host header to the target authority (`host` or `host:port`).
pub fn set_host_header(headers: &mut HeaderMap, authority: &str) {
    if let Ok(v) = HeaderValue::from_str(authority) {
        headers.insert(HOST, v);
    }
}

/// Append `client_ip` to any existing `X-Forwarded-For` chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {client_ip}", prior.join(", "))
    };
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("x-query-id", "q-1".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert!(headers.get("connection").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers.get("x-query-id").unwrap(), "q-1");
    }

    #[test]
    fn connection_named_headers_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "X-Trace-Hop, close".parse().unwrap());
        headers.insert("x-trace-hop", "1".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert!(headers.get("x-trace-hop").is_none());
        assert_eq!(headers.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn outbound_drops_host_and_content_length() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, "grafana.local:3000".parse().unwrap());
        inbound.insert(CONTENT_LENGTH, "12".parse().unwrap());
        inbound.insert("content-type", "text/plain".parse().unwrap());

        let out = prepare_outbound(&inbound);

        assert!(out.get(HOST).is_none());
        assert!(out.get(CONTENT_LENGTH).is_none());
        assert_eq!(out.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn response_set_cookie_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, "session=backend".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        sanitize_response_headers(&mut headers);

        assert!(headers.get(SET_COOKIE).is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn host_header_is_target_authority() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "grafana.local".parse().unwrap());
        set_host_header(&mut headers, "influx.internal:8086");
        assert_eq!(headers.get(HOST).unwrap(), "influx.internal:8086");
    }

    #[test]
    fn forwarded_for_appends_to_chain() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.5".parse().unwrap());
        assert_eq!(headers.get(&X_FORWARDED_FOR).unwrap(), "10.0.0.5");

        append_forwarded_for(&mut headers, "192.168.1.9".parse().unwrap());
        assert_eq!(
            headers.get(&X_FORWARDED_FOR).unwrap(),
            "10.0.0.5, 192.168.1.9"
        );
    }
}
