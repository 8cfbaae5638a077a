use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{error, info};

use vigil_core::{logging, GatewayConfig};
use vigil_gateway::shutdown::wait_for_shutdown_signal;
use vigil_gateway::{Gateway, GatewayPorts};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config = match parse_config_path(&args)? {
        Some(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    logging::init_from_config(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "Vigil gateway starting");

    let ports = GatewayPorts::dry_run(&config.actuators);
    let gateway = Gateway::start(config, ports)
        .await
        .context("failed to start gateway")?;

    if let Err(e) = wait_for_shutdown_signal().await {
        error!(error = %e, "signal handler failed; shutting down");
    }
    info!("shutdown signal received");

    gateway.shutdown().await;
    Ok(())
}

fn parse_config_path(args: &[String]) -> Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }
    Ok(None)
}
