/**
 * MODELS - Domain types shared by the actuator board and the bridge board
 *
 * ROLE: Readings sampled each tick, the fixed actuator set, the directives
 * that request actuator transitions, and the audit events they produce.
 *
 * OWNERSHIP: ActuatorState values live only inside the controller on the
 * actuator board. Everything else here is a plain value passed by copy.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Default pump intensity (percent) when a pump is switched ON.
pub const DEFAULT_PUMP_INTENSITY: u8 = 90;

/// Physical quantities reported by the sensor bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quantity {
    Moisture,
    Temperature,
    Ph,
    Ec,
    Nitrogen,
    Phosphorus,
    Potassium,
    UvIndex,
    WaterLevel,
}

impl Quantity {
    pub const ALL: [Quantity; 9] = [
        Quantity::Moisture,
        Quantity::Temperature,
        Quantity::Ph,
        Quantity::Ec,
        Quantity::Nitrogen,
        Quantity::Phosphorus,
        Quantity::Potassium,
        Quantity::UvIndex,
        Quantity::WaterLevel,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Quantity::Moisture => "moisture",
            Quantity::Temperature => "temperature",
            Quantity::Ph => "ph",
            Quantity::Ec => "ec",
            Quantity::Nitrogen => "nitrogen",
            Quantity::Phosphorus => "phosphorus",
            Quantity::Potassium => "potassium",
            Quantity::UvIndex => "uvIndex",
            Quantity::WaterLevel => "waterLevel",
        }
    }
}

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    LocalSensor,
    RemoteReport,
}

/// One normalized sample. Replaced wholesale every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub quantity: Quantity,
    pub value: f64,
    pub source: ReadingSource,
}

impl Reading {
    pub const fn local(quantity: Quantity, value: f64) -> Self {
        Self { quantity, value, source: ReadingSource::LocalSensor }
    }
}

/// Looks up a quantity in a reading set. Missing means "not sampled this tick".
pub fn value_of(readings: &[Reading], quantity: Quantity) -> Option<f64> {
    readings
        .iter()
        .rev()
        .find(|r| r.quantity == quantity)
        .map(|r| r.value)
}

/// The fixed set of controlled outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActuatorId {
    WaterPump,
    FertilizerPump,
    AlertLed,
    Buzzer,
}

impl ActuatorId {
    pub const ALL: [ActuatorId; 4] = [
        ActuatorId::WaterPump,
        ActuatorId::FertilizerPump,
        ActuatorId::AlertLed,
        ActuatorId::Buzzer,
    ];

    pub const fn index(&self) -> usize {
        match self {
            ActuatorId::WaterPump => 0,
            ActuatorId::FertilizerPump => 1,
            ActuatorId::AlertLed => 2,
            ActuatorId::Buzzer => 3,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ActuatorId::WaterPump => "Water Pump",
            ActuatorId::FertilizerPump => "Fertilizer Pump",
            ActuatorId::AlertLed => "Alert LED",
            ActuatorId::Buzzer => "Buzzer",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mutable on/off record of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorState {
    pub on: bool,
    /// 0..=100
    pub intensity: u8,
}

impl ActuatorState {
    pub const OFF: ActuatorState = ActuatorState { on: false, intensity: 0 };

    pub const fn on_at(intensity: u8) -> Self {
        Self { on: true, intensity: clamp_percent(intensity) }
    }
}

pub const fn clamp_percent(value: u8) -> u8 {
    if value > 100 { 100 } else { value }
}

/// Colors the RGB alert indicator can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "red" => Some(Color::Red),
            "green" => Some(Color::Green),
            "blue" => Some(Color::Blue),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An actuation request, decoded from a command line or produced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    SetActuator { actuator: ActuatorId, on: bool, intensity: u8 },
    /// Speed change for an actuator that is already running.
    SetIntensity { actuator: ActuatorId, intensity: u8 },
    SetIndicator { color: Color, blinking: bool },
    Buzz { seconds: u32 },
}

impl Directive {
    /// ON/OFF request with the default pump intensity when switching on.
    pub const fn switch(actuator: ActuatorId, on: bool) -> Self {
        Directive::SetActuator {
            actuator,
            on,
            intensity: if on { DEFAULT_PUMP_INTENSITY } else { 0 },
        }
    }
}

/// Ordered directives decoded from one protocol line, plus the clauses that
/// were dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    pub directives: Vec<Directive>,
    pub skipped: Vec<crate::codec::ClauseError>,
}

impl CommandBatch {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }
}

/// Audit record emitted for every actuator transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: OffsetDateTime,
    pub message: String,
}

impl Event {
    pub fn new(timestamp: OffsetDateTime, message: impl Into<String>) -> Self {
        Self { timestamp, message: message.into() }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self
            .timestamp
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        write!(f, "[{}] {}", ts, self.message)
    }
}
