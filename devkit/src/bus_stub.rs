/*!
Scripted sensor bus

Implements `SensorBus` from values set by the test. Clones share the same
script, so a test keeps one handle while the sampler owns another.
*/

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use verdant_protocol::ports::{BusSource, SensorBus, SensorError, SoilRegisters, WATER_LEVEL_ADC_MAX};

#[derive(Debug, Clone)]
struct BusScript {
    soil: SoilRegisters,
    water_adc: u16,
    uv_raw: u16,
    soil_fault: Option<SensorError>,
    water_fault: Option<SensorError>,
    uv_fault: Option<SensorError>,
    delay: Option<Duration>,
    reads: u32,
}

impl Default for BusScript {
    fn default() -> Self {
        Self {
            // 25.0 %, 22.0 °C, N 35, P 20, K 45, pH 6.5, EC 1200
            soil: [250, 220, 35, 20, 45, 65, 1200, 0],
            water_adc: percent_to_adc(60.0),
            uv_raw: 150,
            soil_fault: None,
            water_fault: None,
            uv_fault: None,
            delay: None,
            reads: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedBus {
    script: Arc<Mutex<BusScript>>,
}

impl ScriptedBus {
    /// Healthy bus with mid-band values for every quantity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_moisture(&self, percent: f64) {
        self.script.lock().soil[0] = (percent * 10.0).round() as u16;
    }

    pub fn set_temperature(&self, celsius: f64) {
        self.script.lock().soil[1] = ((celsius * 10.0).round() as i16) as u16;
    }

    pub fn set_nitrogen(&self, value: u16) {
        self.script.lock().soil[2] = value;
    }

    pub fn set_ph(&self, ph: f64) {
        self.script.lock().soil[5] = (ph * 10.0).round() as u16;
    }

    pub fn set_water_level(&self, percent: f64) {
        self.script.lock().water_adc = percent_to_adc(percent);
    }

    pub fn set_uv_index(&self, index: f64) {
        self.script.lock().uv_raw = (index * 100.0).round() as u16;
    }

    /// Makes every read of `source` fail until `heal` is called.
    pub fn fail(&self, source: BusSource, error: SensorError) {
        let mut script = self.script.lock();
        match source {
            BusSource::Soil => script.soil_fault = Some(error),
            BusSource::WaterLevel => script.water_fault = Some(error),
            BusSource::Uv => script.uv_fault = Some(error),
        }
    }

    pub fn heal(&self, source: BusSource) {
        let mut script = self.script.lock();
        match source {
            BusSource::Soil => script.soil_fault = None,
            BusSource::WaterLevel => script.water_fault = None,
            BusSource::Uv => script.uv_fault = None,
        }
    }

    /// Every transaction sleeps this long first (to exercise timeouts).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.script.lock().delay = delay;
    }

    /// Number of bus transactions attempted so far.
    pub fn read_count(&self) -> u32 {
        self.script.lock().reads
    }

    async fn transaction(&self) -> BusScript {
        let delay = {
            let mut script = self.script.lock();
            script.reads += 1;
            script.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().clone()
    }
}

fn percent_to_adc(percent: f64) -> u16 {
    (percent / 100.0 * f64::from(WATER_LEVEL_ADC_MAX)).round() as u16
}

impl SensorBus for ScriptedBus {
    async fn read_soil(&mut self) -> Result<SoilRegisters, SensorError> {
        let script = self.transaction().await;
        match script.soil_fault {
            Some(error) => Err(error),
            None => Ok(script.soil),
        }
    }

    async fn read_water_level(&mut self) -> Result<u16, SensorError> {
        let script = self.transaction().await;
        match script.water_fault {
            Some(error) => Err(error),
            None => Ok(script.water_adc),
        }
    }

    async fn read_uv(&mut self) -> Result<u16, SensorError> {
        let script = self.transaction().await;
        match script.uv_fault {
            Some(error) => Err(error),
            None => Ok(script.uv_raw),
        }
    }
}
