use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kitty_mocker::metrics::MetricsServer;
use kitty_mocker::{PortRange, RootDispatcher, ServerConfig};

/// On-demand HTTP mock servers
#[derive(Parser, Debug)]
#[command(name = "kitty-mocker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface the dispatcher and every mocker bind to
    #[arg(long, env = "KITTY_HOST")]
    host: Option<String>,

    /// Root dispatcher port
    #[arg(short, long, env = "KITTY_PORT")]
    port: Option<u16>,

    /// Port range for mockers, e.g. 5000-6000
    #[arg(short, long, env = "KITTY_RANGE")]
    range: Option<PortRange>,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "KITTY_METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    /// Defaults, then the config file, then flags and environment.
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(range) = self.range {
            config.mockers_ports_range = range;
        }
        if self.metrics_port.is_some() {
            config.metrics_port = self.metrics_port;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;

    if let Some(metrics_port) = config.metrics_port {
        let server = MetricsServer::new(config.host.clone(), metrics_port);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let dispatcher = RootDispatcher::start(&config)
        .await
        .with_context(|| format!("failed to start on port {}", config.server_port))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    let manager = std::sync::Arc::clone(dispatcher.manager());
    dispatcher.stop().await?;
    let stopped = manager.stop_all().await;
    info!("Stopped {} mockers", stopped.len());
    Ok(())
}
