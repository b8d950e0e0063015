//! Verdant Bridge - connects the actuator board to the farm service
//!
//! The bridge holds no actuator state. It:
//! - reads sensor report lines from the actuator board link
//! - publishes the newest report to the service
//! - polls the alert checks and forwards the resulting commands back

mod alerts;
mod config;
mod gateway;
mod relay;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use verdant_protocol::{LinkError, StreamLink};

use crate::config::BridgeConfig;
use crate::gateway::{CloudGateway, ReqwestTransport};
use crate::relay::{Relay, RelayResult};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if std::env::args().any(|arg| arg == "--write-default-config") {
        let path = BridgeConfig::config_file_path();
        BridgeConfig::default().save_to(&path).await.context("Failed to write default configuration")?;
        info!("default configuration written to {}", path.display());
        return Ok(());
    }

    let config = BridgeConfig::load().await.context("Failed to load bridge configuration")?;
    info!("Verdant bridge v{} -> {}", env!("CARGO_PKG_VERSION"), config.cloud.base_url);

    let transport = ReqwestTransport::new(config.cloud.request_timeout()).context("Failed to build HTTP client")?;
    let gateway = CloudGateway::new(transport, &config.cloud);
    info!("polling {} alert categories after each report", gateway.alerts().len());
    let mut relay = Relay::new(gateway);

    tokio::select! {
        _ = run(&mut relay, &config) => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

/// Connects to the actuator board and relays until the link drops, forever.
async fn run(relay: &mut Relay<ReqwestTransport>, config: &BridgeConfig) {
    loop {
        let stream = match TcpStream::connect(&config.link.connect).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("link connect to {} failed: {}", config.link.connect, e);
                tokio::time::sleep(config.link.reconnect_delay()).await;
                continue;
            }
        };
        info!("link up with {}", config.link.connect);

        let (reader, writer) = stream.into_split();
        let mut link = StreamLink::new(reader, writer, config.link.receive_timeout()).with_send_timeout(config.link.send_timeout());

        loop {
            match relay.step(&mut link).await {
                Ok(RelayResult::Idle) => {}
                Ok(result) => debug!("relay step: {:?}", result),
                Err(LinkError::Closed) => {
                    warn!("link closed by the actuator board");
                    break;
                }
                Err(e) => {
                    warn!("link error: {}", e);
                    break;
                }
            }
        }

        tokio::time::sleep(config.link.reconnect_delay()).await;
    }
}
