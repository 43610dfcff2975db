use serde::Deserialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Security context
// ---------------------------------------------------------------------------

/// Authenticated caller identity, installed as a request extension by the host's auth layer.
///
/// The organization scopes data-source lookups; it is never taken from the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    organization_id: i64,
    subject: Option<String>,
}

impl SecurityContext {
    #[must_use]
    pub fn new(organization_id: i64) -> Self {
        Self {
            organization_id,
            subject: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn organization_id(&self) -> i64 {
        self.organization_id
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Secret material
// ---------------------------------------------------------------------------

/// A password or token. `Debug` and `Display` never reveal the value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// JSON setting that requires a service token before the request is forwarded.
pub const TOKEN_AUTH_SETTING: &str = "tokenAuth";

/// Backend family of a data source. Determines how the outbound request is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum DataSourceKind {
    /// Any plain HTTP backend (graphite, prometheus, elasticsearch, ...).
    GenericHttp,
    /// Pre-1.0 time-series API: database in the path, credentials in the query.
    LegacyTimeSeriesV08,
    /// Time-series API authenticated with HTTP Basic.
    TimeSeriesV1,
    /// Cloud metrics API served by a dedicated handler instead of the generic proxy.
    CloudMetrics,
}

impl DataSourceKind {
    /// Map a stored type name to a kind. Unknown names are plain HTTP backends.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "influxdb_08" => Self::LegacyTimeSeriesV08,
            "influxdb" => Self::TimeSeriesV1,
            "cloudwatch" => Self::CloudMetrics,
            _ => Self::GenericHttp,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenericHttp => "http",
            Self::LegacyTimeSeriesV08 => "influxdb_08",
            Self::TimeSeriesV1 => "influxdb",
            Self::CloudMetrics => "cloudwatch",
        }
    }
}

impl From<String> for DataSourceKind {
    fn from(name: String) -> Self {
        Self::from_type_name(&name)
    }
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored connection and auth configuration of a data source.
///
/// A read-only snapshot: the proxy never mutates it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSource {
    pub id: i64,
    pub org_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DataSourceKind,
    pub url: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: SecretValue,
    #[serde(default)]
    pub basic_auth: bool,
    #[serde(default)]
    pub basic_auth_user: String,
    #[serde(default)]
    pub basic_auth_password: SecretValue,
    #[serde(default)]
    pub json_data: Map<String, Value>,
}

impl DataSource {
    #[must_use]
    pub fn new(id: i64, org_id: i64, kind: DataSourceKind, url: impl Into<String>) -> Self {
        Self {
            id,
            org_id,
            name: String::new(),
            kind,
            url: url.into(),
            database: String::new(),
            user: String::new(),
            password: SecretValue::default(),
            basic_auth: false,
            basic_auth_user: String::new(),
            basic_auth_password: SecretValue::default(),
            json_data: Map::new(),
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = SecretValue::new(password);
        self
    }

    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = true;
        self.basic_auth_user = user.into();
        self.basic_auth_password = SecretValue::new(password);
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.json_data.insert(key.into(), value);
        self
    }

    /// Read a boolean JSON setting; missing or non-boolean values are `false`.
    #[must_use]
    pub fn setting_bool(&self, key: &str) -> bool {
        self.json_data
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn token_auth_enabled(&self) -> bool {
        self.setting_bool(TOKEN_AUTH_SETTING)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kind_from_known_type_names() {
        assert_eq!(
            DataSourceKind::from_type_name("influxdb_08"),
            DataSourceKind::LegacyTimeSeriesV08
        );
        assert_eq!(
            DataSourceKind::from_type_name("influxdb"),
            DataSourceKind::TimeSeriesV1
        );
        assert_eq!(
            DataSourceKind::from_type_name("cloudwatch"),
            DataSourceKind::CloudMetrics
        );
    }

    #[test]
    fn unknown_type_name_is_generic_http() {
        for name in ["graphite", "prometheus", "elasticsearch", ""] {
            assert_eq!(
                DataSourceKind::from_type_name(name),
                DataSourceKind::GenericHttp
            );
        }
    }

    #[test]
    fn deserializes_stored_data_source() {
        let ds: DataSource = serde_json::from_value(json!({
            "id": 7,
            "org_id": 1,
            "type": "influxdb",
            "url": "http://influx:8086",
            "database": "metrics",
            "user": "reader",
            "password": "s3cret",
            "json_data": {"tokenAuth": true}
        }))
        .unwrap();

        assert_eq!(ds.kind, DataSourceKind::TimeSeriesV1);
        assert_eq!(ds.password.expose(), "s3cret");
        assert!(!ds.basic_auth);
        assert!(ds.token_auth_enabled());
    }

    #[test]
    fn debug_redacts_passwords() {
        let ds = DataSource::new(1, 1, DataSourceKind::TimeSeriesV1, "http://influx:8086")
            .with_credentials("reader", "p4ssw0rd")
            .with_basic_auth("proxy", "b4sic-pw");

        let debug = format!("{ds:?}");
        assert!(!debug.contains("p4ssw0rd"));
        assert!(!debug.contains("b4sic-pw"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn non_boolean_setting_reads_as_false() {
        let ds = DataSource::new(1, 1, DataSourceKind::GenericHttp, "http://x")
            .with_setting(TOKEN_AUTH_SETTING, json!("yes"));
        assert!(!ds.token_auth_enabled());
    }
}
