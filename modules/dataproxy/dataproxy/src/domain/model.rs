use std::net::IpAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use super::error::DomainError;

/// Inbound request after routing: what the caller wants forwarded.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string as sent by the caller, without the leading `?`.
    /// Forwarded byte for byte; never decoded.
    pub query: String,
    /// Trailing path to forward, without leading slashes.
    pub proxy_path: String,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
}

impl ProxyRequest {
    #[must_use]
    pub fn new(method: Method, proxy_path: &str) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: String::new(),
            proxy_path: proxy_path.trim_start_matches('/').to_owned(),
            body: Bytes::new(),
            client_ip: None,
        }
    }

    /// Whether the proxy path has a `..` segment, plain or percent-encoded.
    /// Such a path would resolve outside the data source's base path.
    #[must_use]
    pub fn has_parent_segment(&self) -> bool {
        self.proxy_path
            .split('/')
            .any(|seg| seg.to_ascii_lowercase().replace("%2e", ".") == "..")
    }
}

/// Backend location derived from a data source's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    /// Host as it appears in a URL (IPv6 literals keep their brackets).
    pub host: String,
    /// Port as written in the stored URL, including an explicit default port.
    pub port: Option<u16>,
    pub base_path: String,
}

impl Target {
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDataSource` if the URL does not parse, has no
    /// host, or is not `http`/`https`.
    pub fn parse(raw: &str, instance: &str) -> Result<Self, DomainError> {
        let invalid = |detail: String| DomainError::InvalidDataSource {
            detail,
            instance: instance.to_owned(),
        };

        let url = url::Url::parse(raw).map_err(|e| invalid(format!("{raw}: {e}")))?;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(invalid(format!("unsupported scheme '{scheme}'")));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid(format!("{raw}: missing host")))?;

        // `Url` drops a default port; the allow-list matches the port as written.
        let port = raw
            .parse::<http::Uri>()
            .ok()
            .and_then(|uri| uri.port_u16())
            .or_else(|| url.port());

        Ok(Self {
            scheme: scheme.to_owned(),
            host: host.to_owned(),
            port,
            base_path: url.path().to_owned(),
        })
    }

    /// `host` or `host:port`: the value matched against the allow-list and sent as `Host`.
    #[must_use]
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Mutations computed for one request, applied by the director.
///
/// Built by a pure function of the data source and the inbound request, so
/// the same input always yields an equal plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    pub target: Target,
    /// Full outbound path: base path joined with the variant's suffix.
    pub path: String,
    /// Raw outbound query string, without the leading `?`.
    pub query: String,
    /// Applied before `set_headers`.
    pub remove_headers: Vec<HeaderName>,
    /// At most one entry per header name; later rules replace earlier ones.
    pub set_headers: Vec<(HeaderName, HeaderValue)>,
}

impl RewritePlan {
    #[must_use]
    pub fn new(target: Target, path: String, query: String) -> Self {
        Self {
            target,
            path,
            query,
            remove_headers: Vec::new(),
            set_headers: Vec::new(),
        }
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.set_headers.retain(|(n, _)| *n != name);
        self.set_headers.push((name, value));
    }

    pub fn remove_header(&mut self, name: HeaderName) {
        self.set_headers.retain(|(n, _)| *n != name);
        if !self.remove_headers.contains(&name) {
            self.remove_headers.push(name);
        }
    }

    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.set_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}
