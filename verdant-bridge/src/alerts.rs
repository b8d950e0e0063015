//! Alert check responses and their translation into directives.
//!
//! Response shape (every field optional):
//! `{"success": bool, "message": str, "led": {"color", "blink"},
//!   "buzzer": {"time"}, "waterPump": {"on"}, "fertilizerPump": {"on"}}`
//!
//! Critical alerts come without a top-level `success`; a response counts as
//! positive when `success` is true, or absent with at least one action.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use verdant_protocol::{ActuatorId, Color, Directive};

const DEFAULT_BUZZ_SECONDS: u32 = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub led: Option<LedAction>,
    pub buzzer: Option<BuzzerAction>,
    pub water_pump: Option<PumpAction>,
    pub fertilizer_pump: Option<PumpAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedAction {
    pub success: Option<bool>,
    pub color: String,
    #[serde(default)]
    pub blink: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuzzerAction {
    pub success: Option<bool>,
    /// Seconds; the service sends numbers or numeric strings.
    pub time: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PumpAction {
    pub success: Option<bool>,
    #[serde(default = "default_on")]
    pub on: bool,
}

fn default_on() -> bool {
    true
}

impl AlertResponse {
    pub fn has_actions(&self) -> bool {
        self.led.is_some() || self.buzzer.is_some() || self.water_pump.is_some() || self.fertilizer_pump.is_some()
    }

    pub fn is_positive(&self) -> bool {
        self.success.unwrap_or_else(|| self.has_actions())
    }
}

/// Directives requested by one alert response, in LED, buzzer, water pump,
/// fertilizer pump order. A negative response requests nothing.
pub fn translate(response: &AlertResponse) -> Vec<Directive> {
    if !response.is_positive() {
        return Vec::new();
    }

    let mut directives = Vec::new();

    if let Some(led) = response.led.as_ref().filter(|a| a.success != Some(false)) {
        match Color::parse(&led.color.to_ascii_lowercase()) {
            Some(color) => directives.push(Directive::SetIndicator { color, blinking: led.blink }),
            None => warn!("[alerts] unknown LED color '{}' ignored", led.color),
        }
    }

    if let Some(buzzer) = response.buzzer.as_ref().filter(|a| a.success != Some(false)) {
        let seconds = buzzer.time.as_ref().and_then(seconds_of).unwrap_or(DEFAULT_BUZZ_SECONDS);
        directives.push(Directive::Buzz { seconds });
    }

    let pumps = [
        (ActuatorId::WaterPump, &response.water_pump),
        (ActuatorId::FertilizerPump, &response.fertilizer_pump),
    ];
    for (pump, action) in pumps {
        if let Some(action) = action.as_ref().filter(|a| a.success != Some(false)) {
            directives.push(Directive::switch(pump, action.on));
        }
    }

    directives
}

fn seconds_of(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .map(|s| s.min(u64::from(u32::MAX)) as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
