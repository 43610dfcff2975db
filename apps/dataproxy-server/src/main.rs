//! Data proxy server
//!
//! Serves `/datasources/{id}/*` and forwards each request to the data source's
//! backend with its stored credentials applied.
//!
//! ```bash
//! dataproxy-server --config apps/dataproxy-server/config/dataproxy.yaml
//! DATAPROXY__SERVER__BIND_ADDR=0.0.0.0:8087 dataproxy-server
//! ```

#![allow(clippy::print_stdout)]

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Extension;
use clap::Parser;
use dataproxy::{DataProxyModule, SecurityContext};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{AppConfig, LogFormat, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "dataproxy-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file. `DATAPROXY__*` environment variables override it.
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the effective configuration with secrets redacted and exit.
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(cfg: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("invalid log level directive '{}'", cfg.level))?,
    };

    let result = match cfg.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received Ctrl-C, shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        println!("{config:#?}");
        return Ok(());
    }

    init_tracing(&config.logging)?;
    info!(
        bind_addr = %config.server.bind_addr,
        organization_id = config.organization_id,
        "Starting data proxy server"
    );

    let module = DataProxyModule::builder(config.dataproxy).build()?;

    let ctx = SecurityContext::new(config.organization_id);
    let app = module
        .router()
        .layer(Extension(ctx))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Data proxy server stopped");
    Ok(())
}
