/*!
# Verdant DevKit - stubs and helpers for board-less development

Lets both boards be exercised without hardware or a cloud account:
- in-memory link pairs and a recording link
- a scripted sensor bus with per-source failures and delays
- a fake cloud service speaking the sensor data / alert check API
- a test harness with fixed clocks and reading builders
*/

pub mod bus_stub;
pub mod cloud_stub;
pub mod link_stub;
pub mod test_utils;

pub use bus_stub::ScriptedBus;
pub use cloud_stub::{CloudMessageBuilder, FakeCloud, SilentServer};
pub use link_stub::{link_pair, raw_link, MemoryLink, RecordingLink};
pub use test_utils::TestHarness;
