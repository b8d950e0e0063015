/**
 * SENSOR BUS PORT - Boundary between the sampler and the hardware drivers
 *
 * ROLE: The actuator board reads three independent sources every tick:
 * - the soil probe (holding registers over a multi-register bus)
 * - the water-level probe (10-bit ADC)
 * - the UV sensor (raw value, index x 100)
 *
 * Each source can fail on its own; the sampler drops only the readings of
 * the failed source. Drivers are provided by the board support code, the
 * devkit provides a scripted implementation for tests.
 */

use std::future::Future;

/// Number of holding registers read from the soil probe.
pub const SOIL_REGISTER_COUNT: usize = 8;

/// Raw soil probe register block, starting at address 0x00.
///
/// | reg | content |
/// |-----|---------|
/// | 0 | moisture x10 (%) |
/// | 1 | temperature x10 (°C, two's complement) |
/// | 2 | nitrogen (mg/kg) |
/// | 3 | phosphorus (mg/kg) |
/// | 4 | potassium (mg/kg) |
/// | 5 | pH x10 |
/// | 6 | EC (µS/cm) |
/// | 7 | reserved |
pub type SoilRegisters = [u16; SOIL_REGISTER_COUNT];

/// Full-scale value of the water-level ADC.
pub const WATER_LEVEL_ADC_MAX: u16 = 1023;

/// Which bus source a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSource {
    Soil,
    WaterLevel,
    Uv,
}

impl BusSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BusSource::Soil => "soil",
            BusSource::WaterLevel => "water_level",
            BusSource::Uv => "uv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("bus transaction failed: {0}")]
    ReadFailed(String),
    #[error("bus transaction timed out")]
    Timeout,
    #[error("sensor returned invalid data")]
    InvalidData,
}

/// Port for the raw sensor transactions.
pub trait SensorBus {
    fn read_soil(&mut self) -> impl Future<Output = Result<SoilRegisters, SensorError>>;

    fn read_water_level(&mut self) -> impl Future<Output = Result<u16, SensorError>>;

    fn read_uv(&mut self) -> impl Future<Output = Result<u16, SensorError>>;
}
