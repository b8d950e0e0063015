use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::controller::{Band, Thresholds};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("band '{name}': low_on {low_on} is above high_off {high_off}")]
    InvalidBand { name: &'static str, low_on: f64, high_off: f64 },
    #[error("UV tiers: moderate {moderate} is above critical {critical}")]
    InvalidTiers { moderate: f64, critical: f64 },
    #[error("threshold '{0}' is not a finite number")]
    NotFinite(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub tick_secs: u64,
    pub bus_timeout_ms: u64,
    pub link: LinkConf,
    /// Read-only status API; disabled when absent.
    pub http: Option<HttpConf>,
    pub thresholds: Thresholds,
    /// Log a health summary every N ticks (0 = never).
    pub health_every_ticks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LinkConf {
    pub listen: String, // ex: "0.0.0.0:7070"
    pub receive_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpConf {
    pub listen: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 5,
            bus_timeout_ms: 1000,
            link: LinkConf::default(),
            http: Some(HttpConf { listen: "0.0.0.0:8080".into() }),
            thresholds: Thresholds::default(),
            health_every_ticks: 12,
        }
    }
}

impl Default for LinkConf {
    fn default() -> Self {
        Self { listen: "0.0.0.0:7070".into(), receive_timeout_ms: 200, send_timeout_ms: 1000 }
    }
}

impl ControllerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.link.receive_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.link.send_timeout_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        check_band("moisture", t.moisture)?;
        check_band("nitrogen", t.nitrogen)?;
        check_band("water_level", t.water_level)?;
        check_finite("uv.moderate", t.uv.moderate)?;
        check_finite("uv.critical", t.uv.critical)?;
        if t.uv.moderate > t.uv.critical {
            return Err(ConfigError::InvalidTiers { moderate: t.uv.moderate, critical: t.uv.critical });
        }
        Ok(())
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite(name))
    }
}

fn check_band(name: &'static str, band: Band) -> Result<(), ConfigError> {
    check_finite(name, band.low_on)?;
    check_finite(name, band.high_off)?;
    if band.low_on > band.high_off {
        return Err(ConfigError::InvalidBand { name, low_on: band.low_on, high_off: band.high_off });
    }
    Ok(())
}

/// Parses and validates a YAML document. Empty text means defaults.
pub fn parse_config(txt: &str) -> Result<ControllerConfig, ConfigError> {
    if txt.trim().is_empty() {
        return Ok(ControllerConfig::default());
    }
    let cfg: ControllerConfig = serde_yaml::from_str(txt)?;
    cfg.validate()?;
    Ok(cfg)
}

pub async fn load_config_from(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    parse_config(&txt)
}

/// Loads `VERDANT_CONTROLLER_CONFIG` (default `controller.yaml`). Any problem
/// falls back to the defaults so the board still runs.
pub async fn load_config() -> ControllerConfig {
    let path = std::env::var("VERDANT_CONTROLLER_CONFIG").unwrap_or_else(|_| "controller.yaml".into());
    if !Path::new(&path).exists() {
        info!("no {} found, using default configuration", path);
        return ControllerConfig::default();
    }
    match load_config_from(Path::new(&path)).await {
        Ok(cfg) => {
            info!("loaded configuration from {}", path);
            cfg
        }
        Err(e) => {
            warn!("invalid configuration in {}: {}; using defaults", path, e);
            ControllerConfig::default()
        }
    }
}
