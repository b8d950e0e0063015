//! Verdant protocol - types and wire formats shared by both boards
//!
//! - `models`: readings, actuators, directives, events
//! - `codec`: `CMD:` command lines and the sensor report document
//! - `report`: the report document itself
//! - `link`: newline-framed duplex link
//! - `ports`: sensor bus boundary used by the sampler

pub mod codec;
pub mod link;
pub mod models;
pub mod ports;
pub mod report;

pub use codec::{decode, encode_batch, encode_directive, encode_report, ClauseError, CodecError, COMMAND_PREFIX};
pub use link::{LineFramer, LinkError, LinkTransport, StreamLink, DEFAULT_SEND_TIMEOUT};
pub use models::{
    value_of, ActuatorId, ActuatorState, Color, CommandBatch, Directive, Event, Quantity, Reading,
    ReadingSource, DEFAULT_PUMP_INTENSITY,
};
pub use ports::{BusSource, SensorBus, SensorError, SoilRegisters};
pub use report::SensorReport;
