//! Sensor sampler
//!
//! One `sample()` per tick. Each bus source is read under its own timeout;
//! a source that fails or times out contributes no reading at all, so the
//! controller keeps its previous decision instead of seeing a zero.

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use verdant_protocol::ports::WATER_LEVEL_ADC_MAX;
use verdant_protocol::{BusSource, Quantity, Reading, SensorBus, SensorError, SoilRegisters};

/// Readings of one tick plus the sources that failed.
#[derive(Debug, Default, PartialEq)]
pub struct Sample {
    pub readings: Vec<Reading>,
    pub failures: Vec<(BusSource, SensorError)>,
}

pub struct SensorSampler<B> {
    bus: B,
    timeout: Duration,
}

impl<B: SensorBus> SensorSampler<B> {
    pub fn new(bus: B, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    pub async fn sample(&mut self) -> Sample {
        let limit = self.timeout;
        let mut sample = Sample::default();

        let soil = bounded(limit, self.bus.read_soil()).await.and_then(|regs| soil_readings(&regs));
        sample.absorb(BusSource::Soil, soil);

        let water = bounded(limit, self.bus.read_water_level())
            .await
            .and_then(water_level_percent)
            .map(|pct| vec![Reading::local(Quantity::WaterLevel, pct)]);
        sample.absorb(BusSource::WaterLevel, water);

        let uv = bounded(limit, self.bus.read_uv())
            .await
            .map(|raw| vec![Reading::local(Quantity::UvIndex, f64::from(raw) / 100.0)]);
        sample.absorb(BusSource::Uv, uv);

        sample
    }
}

impl Sample {
    fn absorb(&mut self, source: BusSource, result: Result<Vec<Reading>, SensorError>) {
        match result {
            Ok(readings) => self.readings.extend(readings),
            Err(e) => {
                warn!("[sampler] {} read failed: {}", source.as_str(), e);
                self.failures.push((source, e));
            }
        }
    }
}

async fn bounded<T>(limit: Duration, read: impl Future<Output = Result<T, SensorError>>) -> Result<T, SensorError> {
    tokio::time::timeout(limit, read).await.unwrap_or(Err(SensorError::Timeout))
}

/// Converts the soil register block. Implausible blocks are rejected whole.
pub fn soil_readings(regs: &SoilRegisters) -> Result<Vec<Reading>, SensorError> {
    let moisture = f64::from(regs[0]) / 10.0;
    let ph = f64::from(regs[5]) / 10.0;
    if moisture > 100.0 || ph > 14.0 {
        return Err(SensorError::InvalidData);
    }

    Ok(vec![
        Reading::local(Quantity::Moisture, moisture),
        Reading::local(Quantity::Temperature, f64::from(regs[1] as i16) / 10.0),
        Reading::local(Quantity::Ph, ph),
        // µS/cm on the bus, mS/cm in the report
        Reading::local(Quantity::Ec, f64::from(regs[6]) / 1000.0),
        Reading::local(Quantity::Nitrogen, f64::from(regs[2])),
        Reading::local(Quantity::Phosphorus, f64::from(regs[3])),
        Reading::local(Quantity::Potassium, f64::from(regs[4])),
    ])
}

pub fn water_level_percent(adc: u16) -> Result<f64, SensorError> {
    if adc > WATER_LEVEL_ADC_MAX {
        return Err(SensorError::InvalidData);
    }
    Ok(f64::from(adc) * 100.0 / f64::from(WATER_LEVEL_ADC_MAX))
}
