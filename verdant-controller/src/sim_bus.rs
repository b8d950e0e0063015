//! Bench bus for running the controller without hardware.
//!
//! Values drift along slow sine waves with different periods so that every
//! hysteresis band and alert tier is crossed now and then. Deterministic:
//! the same step count always yields the same registers.

use verdant_protocol::ports::WATER_LEVEL_ADC_MAX;
use verdant_protocol::{SensorBus, SensorError, SoilRegisters};

#[derive(Debug, Default)]
pub struct SimulatedBus {
    step: u64,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn wave(&self, center: f64, amplitude: f64, period: f64) -> f64 {
        let phase = self.step as f64 / period * std::f64::consts::TAU;
        center + amplitude * phase.sin()
    }
}

impl SensorBus for SimulatedBus {
    async fn read_soil(&mut self) -> Result<SoilRegisters, SensorError> {
        self.step += 1;
        let moisture = self.wave(25.0, 12.0, 40.0);
        let temperature = self.wave(22.0, 6.0, 90.0);
        let nitrogen = self.wave(35.0, 9.0, 70.0);
        let ph = self.wave(6.5, 0.6, 120.0);

        Ok([
            (moisture * 10.0).round() as u16,
            ((temperature * 10.0).round() as i16) as u16,
            nitrogen.round() as u16,
            self.wave(20.0, 5.0, 55.0).round() as u16,
            self.wave(45.0, 8.0, 65.0).round() as u16,
            (ph * 10.0).round() as u16,
            self.wave(1200.0, 300.0, 80.0).round() as u16,
            0,
        ])
    }

    async fn read_water_level(&mut self) -> Result<u16, SensorError> {
        let percent = self.wave(50.0, 45.0, 100.0).clamp(0.0, 100.0);
        Ok((percent / 100.0 * f64::from(WATER_LEVEL_ADC_MAX)).round() as u16)
    }

    async fn read_uv(&mut self) -> Result<u16, SensorError> {
        let index = self.wave(5.0, 5.0, 60.0).max(0.0);
        Ok((index * 100.0).round() as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{soil_readings, water_level_percent};

    #[tokio::test]
    async fn test_simulated_values_stay_plausible() {
        let mut bus = SimulatedBus::new();
        for _ in 0..200 {
            let soil = bus.read_soil().await.unwrap();
            assert!(soil_readings(&soil).is_ok());
            assert!(water_level_percent(bus.read_water_level().await.unwrap()).is_ok());
            assert!(bus.read_uv().await.unwrap() <= 1000);
        }
    }

    #[tokio::test]
    async fn test_moisture_crosses_both_pump_thresholds() {
        let mut bus = SimulatedBus::new();
        let mut seen = Vec::new();
        for _ in 0..40 {
            seen.push(f64::from(bus.read_soil().await.unwrap()[0]) / 10.0);
        }
        assert!(seen.iter().any(|m| *m < 20.0));
        assert!(seen.iter().any(|m| *m > 30.0));
    }
}
