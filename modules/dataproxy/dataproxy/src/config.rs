use std::fmt;
use std::time::Duration;

use dataproxy_sdk::{DataSource, SecretValue};
use serde::Deserialize;

/// Configuration for the data proxy module.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataProxyConfig {
    /// Permitted target authorities (`host` or `host:port`). Empty permits every target.
    #[serde(default)]
    pub allow_list: Vec<String>,
    #[serde(default = "default_max_body_size_bytes")]
    pub max_body_size_bytes: usize,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Data sources to pre-load into the in-memory resolver.
    /// Intended for development and testing only.
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    /// Token served by the static token provider.
    /// Intended for development and testing only.
    #[serde(default)]
    pub service_token: Option<SecretValue>,
}

impl Default for DataProxyConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            max_body_size_bytes: default_max_body_size_bytes(),
            transport: TransportConfig::default(),
            data_sources: Vec::new(),
            service_token: None,
        }
    }
}

fn default_max_body_size_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl fmt::Debug for DataProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProxyConfig")
            .field("allow_list", &self.allow_list)
            .field("max_body_size_bytes", &self.max_body_size_bytes)
            .field("transport", &self.transport)
            .field(
                "data_sources",
                &self
                    .data_sources
                    .iter()
                    .map(|ds| (ds.org_id, ds.id, ds.kind.as_str()))
                    .collect::<Vec<_>>(),
            )
            .field(
                "service_token",
                &self.service_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Settings of the shared outbound HTTP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Skip TLS certificate validation for every backend.
    ///
    /// Security trade-off: backends commonly run with self-signed certificates,
    /// so validation is off unless explicitly enabled.
    #[serde(default = "default_tls_skip_verify")]
    pub tls_skip_verify: bool,
    /// Bound on TCP connect plus TLS handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Bound on receiving the backend's response headers. Body streaming is unbounded.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum time response bytes are held before being flushed to the caller.
    /// `0` forwards every chunk as soon as it arrives.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls_skip_verify: default_tls_skip_verify(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_tls_skip_verify() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_flush_interval_ms() -> u64 {
    200
}
