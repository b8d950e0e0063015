//! Bridge configuration
//!
//! TOML file at `VERDANT_BRIDGE_CONFIG` (default `bridge.toml`). Missing
//! sections take their defaults, so a file with just the server URL works.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Alert categories checked after every report, in this order.
pub const DEFAULT_ALERTS: [&str; 8] = [
    "moisture-high-alert",
    "moisture-low-alert",
    "water-level-high-alert",
    "water-level-low-alert",
    "nitrogen-high-alert",
    "nitrogen-low-alert",
    "ph-high-alert",
    "ph-low-alert",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub cloud: CloudConfig,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address of the actuator board's link listener.
    pub connect: String,
    pub receive_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub reconnect_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_ms: 5000,
            alerts: DEFAULT_ALERTS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect: "127.0.0.1:7070".to_string(),
            receive_timeout_ms: 500,
            send_timeout_ms: 1000,
            reconnect_secs: 5,
        }
    }
}

impl CloudConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl LinkConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs.max(1))
    }
}

impl BridgeConfig {
    pub fn config_file_path() -> PathBuf {
        std::env::var("VERDANT_BRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("bridge.toml"))
    }

    /// Loads the configured file, or the defaults when it does not exist.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: BridgeConfig = toml::from_str(content)?;
        config.cloud.base_url = config.cloud.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Writes the configuration, e.g. to produce a starter file.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
