use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use dataproxy::DataProxyConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Prefix of environment overrides; `__` separates nested keys,
/// e.g. `DATAPROXY__SERVER__BIND_ADDR=0.0.0.0:8080`.
pub const ENV_PREFIX: &str = "DATAPROXY__";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Organization every incoming request is attributed to.
    #[serde(default = "default_organization_id")]
    pub organization_id: i64,
    #[serde(default)]
    pub dataproxy: DataProxyConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8087))
}

fn default_log_level() -> String {
    "dataproxy=info,dataproxy_server=info,tower_http=info".to_owned()
}

fn default_organization_id() -> i64 {
    1
}

impl AppConfig {
    /// Load from an optional YAML file, then apply `DATAPROXY__*` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or a value fails to deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(
                path.exists(),
                "config file not found: {}",
                path.display()
            );
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        figment::Jail::expect_with(|_| {
            let cfg = AppConfig::load(None).unwrap();
            assert_eq!(cfg.server.bind_addr, default_bind_addr());
            assert_eq!(cfg.logging.format, LogFormat::Pretty);
            assert_eq!(cfg.organization_id, 1);
            assert!(cfg.dataproxy.data_sources.is_empty());
            Ok(())
        });
    }

    #[test]
    fn yaml_file_is_loaded() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "dataproxy.yaml",
                r#"
server:
  bind_addr: "0.0.0.0:9000"
logging:
  format: json
dataproxy:
  allow_list: ["influx.internal:8086"]
  data_sources:
    - id: 3
      org_id: 1
      type: influxdb
      url: "http://influx.internal:8086"
      user: admin
      password: secret
"#,
            )?;

            let cfg = AppConfig::load(Some(Path::new("dataproxy.yaml"))).unwrap();
            assert_eq!(cfg.server.bind_addr.port(), 9000);
            assert_eq!(cfg.logging.format, LogFormat::Json);
            assert_eq!(cfg.dataproxy.allow_list, vec!["influx.internal:8086"]);
            assert_eq!(cfg.dataproxy.data_sources.len(), 1);
            assert_eq!(cfg.dataproxy.data_sources[0].password.expose(), "secret");
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("dataproxy.yaml", "organization_id: 4\n")?;
            jail.set_env("DATAPROXY__ORGANIZATION_ID", "7");
            jail.set_env("DATAPROXY__SERVER__BIND_ADDR", "127.0.0.1:7000");

            let cfg = AppConfig::load(Some(Path::new("dataproxy.yaml"))).unwrap();
            assert_eq!(cfg.organization_id, 7);
            assert_eq!(cfg.server.bind_addr.port(), 7000);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/dataproxy.yaml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
