//! Sensor report document
//!
//! Flat JSON object with fixed keys in a fixed order. Downstream consumers
//! (the bridge and the cloud service) rely on both, so the struct field order
//! below is the wire order.

use serde::{Deserialize, Serialize};

use crate::models::{value_of, Quantity, Reading, ReadingSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReport {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
    pub nitrogen: Option<i64>,
    pub phosphorus: Option<i64>,
    pub potassium: Option<i64>,
    pub uv_index: Option<f64>,
    pub water_level: Option<f64>,
}

impl SensorReport {
    /// Builds the document from a reading set. A quantity missing this tick
    /// is rendered as `null`, never as zero.
    pub fn from_readings(readings: &[Reading]) -> Self {
        let dp = |q: Quantity, places: i32| value_of(readings, q).map(|v| round_to(v, places));
        let int = |q: Quantity| value_of(readings, q).map(|v| v.round() as i64);

        Self {
            moisture: dp(Quantity::Moisture, 1),
            temperature: dp(Quantity::Temperature, 1),
            ph: dp(Quantity::Ph, 2),
            ec: dp(Quantity::Ec, 2),
            nitrogen: int(Quantity::Nitrogen),
            phosphorus: int(Quantity::Phosphorus),
            potassium: int(Quantity::Potassium),
            uv_index: dp(Quantity::UvIndex, 2),
            water_level: dp(Quantity::WaterLevel, 1),
        }
    }

    /// Parses a report line received over the link.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Converts back to readings, skipping null fields.
    pub fn to_readings(&self, source: ReadingSource) -> Vec<Reading> {
        let fields = [
            (Quantity::Moisture, self.moisture),
            (Quantity::Temperature, self.temperature),
            (Quantity::Ph, self.ph),
            (Quantity::Ec, self.ec),
            (Quantity::Nitrogen, self.nitrogen.map(|v| v as f64)),
            (Quantity::Phosphorus, self.phosphorus.map(|v| v as f64)),
            (Quantity::Potassium, self.potassium.map(|v| v as f64)),
            (Quantity::UvIndex, self.uv_index),
            (Quantity::WaterLevel, self.water_level),
        ];

        fields
            .into_iter()
            .filter_map(|(quantity, value)| value.map(|value| Reading { quantity, value, source }))
            .collect()
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
