mod config;
mod handler;
mod logging;
mod metrics;
mod server;

use anyhow::Result;
use clap::Parser;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::ProxyConfig;
use crate::handler::state::ProxyState;

#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Args {
    /// TOML file overriding the built-in defaults.
    #[arg(long)]
    config_file: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, action)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&args)?;

    let config = ProxyConfig::load(args.config_file.as_deref())?;
    let proxy_socket_addr = SocketAddr::new(config.listen_address, config.proxy_port);
    let state = ProxyState::new(config)?;

    if let Some(metrics_port) = state.config.metrics_port {
        let loopback_address = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        let metrics_socket_addr = SocketAddr::new(loopback_address, metrics_port);
        metrics::init(metrics_socket_addr)?;
        tracing::info!("Serving metrics on {metrics_socket_addr}");
    }

    let listener = tokio::net::TcpListener::bind(proxy_socket_addr).await?;

    tracing::info!(
        "Proxy running on http://{proxy_socket_addr}, forwarding to {}",
        state.upstream
    );

    server::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(?error, "Couldn't listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
