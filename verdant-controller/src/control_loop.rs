//! The actuator board's control loop steps.
//!
//! `main` owns the scheduling (ticker, link, buzzer deadline); this module
//! owns what happens at each wake-up. Within a tick the order is fixed:
//! sample, evaluate, report. Link lines and deadlines are handled between
//! ticks through the same controller.

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use verdant_protocol::{decode, encode_report, Event, LinkTransport, SensorBus, COMMAND_PREFIX};

use crate::controller::{HysteresisController, Outcome};
use crate::health::HealthTracker;
use crate::sampler::SensorSampler;
use crate::state::{Shared, StatusSnapshot};

pub struct ControlLoop<B> {
    sampler: SensorSampler<B>,
    controller: HysteresisController,
    health: HealthTracker,
    status: Shared<StatusSnapshot>,
    summary_every: u64,
}

impl<B: SensorBus> ControlLoop<B> {
    pub fn new(
        sampler: SensorSampler<B>,
        controller: HysteresisController,
        health: HealthTracker,
        status: Shared<StatusSnapshot>,
        summary_every: u64,
    ) -> Self {
        Self { sampler, controller, health, status, summary_every }
    }

    pub fn controller(&self) -> &HysteresisController {
        &self.controller
    }

    pub fn next_deadline(&self) -> Option<OffsetDateTime> {
        self.controller.next_deadline()
    }

    /// One control tick: sample, evaluate, then send the report when a link
    /// peer is attached.
    pub async fn tick<L: LinkTransport>(&mut self, link: Option<&mut L>, now: OffsetDateTime) -> Vec<Event> {
        let sample = self.sampler.sample().await;
        self.health.record_bus_failures(sample.failures.len());

        let outcome = self.controller.evaluate(&sample.readings, now);
        let events = self.record(outcome, now);

        if let Some(link) = link {
            if sample.readings.is_empty() {
                warn!("[loop] no readings this tick, report skipped");
            } else {
                match encode_report(&sample.readings) {
                    Ok(report) => {
                        if let Err(e) = link.send(&report).await {
                            warn!("[loop] report not sent: {}", e);
                        }
                    }
                    Err(e) => warn!("[loop] report encoding failed: {}", e),
                }
            }
        }

        let ticks = self.health.record_tick();
        if self.summary_every > 0 && ticks % self.summary_every == 0 {
            self.health.log_summary();
        }
        events
    }

    /// Decodes one received line and applies its directives in order.
    pub fn handle_line(&mut self, line: &str, now: OffsetDateTime) -> Vec<Event> {
        self.health.record_line();
        if !line.trim_start().starts_with(COMMAND_PREFIX) {
            debug!("[loop] ignoring non-command line: {}", line);
            return Vec::new();
        }

        let batch = decode(line);
        for skipped in &batch.skipped {
            warn!("[loop] clause dropped: {}", skipped);
        }
        self.health.record_skipped_clauses(batch.skipped.len());

        let mut events = Vec::new();
        for directive in batch.directives {
            let outcome = self.controller.apply(directive, now);
            events.extend(self.record(outcome, now));
        }
        events
    }

    /// Ends a timed buzz once its deadline has passed.
    pub fn on_deadline(&mut self, now: OffsetDateTime) -> Vec<Event> {
        let outcome = self.controller.expire(now);
        self.record(outcome, now)
    }

    pub fn shutdown(&mut self, now: OffsetDateTime) -> Vec<Event> {
        let outcome = self.controller.all_off(now);
        self.record(outcome, now)
    }

    fn record(&mut self, outcome: Outcome, now: OffsetDateTime) -> Vec<Event> {
        if outcome.is_empty() {
            return Vec::new();
        }
        for event in &outcome.events {
            info!("{}", event);
        }
        self.health.record_events(outcome.events.len());
        *self.status.lock() = StatusSnapshot::capture(&self.controller, now);
        outcome.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Severity, Thresholds};
    use crate::state::new_state;
    use std::time::Duration;
    use tokio::io::{duplex, split};
    use verdant_devkit::test_utils::at;
    use verdant_devkit::{RecordingLink, ScriptedBus, TestHarness};
    use verdant_protocol::{ActuatorId, BusSource, SensorError, StreamLink};

    fn control_loop(bus: ScriptedBus) -> (ControlLoop<ScriptedBus>, Shared<StatusSnapshot>, HealthTracker) {
        let status = new_state(StatusSnapshot::default());
        let health = HealthTracker::new();
        let control = ControlLoop::new(
            SensorSampler::new(bus, Duration::from_millis(100)),
            HysteresisController::new(Thresholds::default()),
            health.clone(),
            status.clone(),
            0,
        );
        (control, status, health)
    }

    #[tokio::test]
    async fn test_tick_samples_evaluates_and_reports() {
        let mut harness = TestHarness::new();
        harness.bus.set_moisture(15.0);
        let (mut control, status, _) = control_loop(harness.bus.clone());
        let mut link = harness.link.clone();

        let events = control.tick(Some(&mut link), at(0)).await;
        assert_eq!(events.len(), 1);
        assert!(control.controller().state(ActuatorId::WaterPump).on);
        assert!(status.lock().actuators[0].state.on);

        harness.expect_lines("{", 1);
        harness.verify_expectations().unwrap();
        harness.assert_report_field("moisture", &serde_json::json!(15.0)).unwrap();
    }

    #[tokio::test]
    async fn test_failed_soil_source_reports_null_and_keeps_pump() {
        let mut harness = TestHarness::new();
        harness.bus.set_moisture(10.0);
        let (mut control, _, health) = control_loop(harness.bus.clone());
        let mut link = harness.link.clone();
        control.tick(Some(&mut link), at(0)).await;

        harness.bus.fail(BusSource::Soil, SensorError::Timeout);
        let events = control.tick(Some(&mut link), at(5)).await;

        assert!(events.is_empty());
        assert!(control.controller().state(ActuatorId::WaterPump).on);
        harness.assert_report_field("moisture", &serde_json::Value::Null).unwrap();
        assert_eq!(health.get_health().bus_failures, 1);
    }

    #[tokio::test]
    async fn test_tick_without_link_still_controls() {
        let bus = ScriptedBus::new();
        bus.set_uv_index(9.0);
        let (mut control, _, health) = control_loop(bus);

        let events = control.tick::<RecordingLink>(None, at(0)).await;
        assert_eq!(events.len(), 2);
        assert!(control.controller().state(ActuatorId::Buzzer).on);
        assert_eq!(health.get_health().ticks, 1);
    }

    #[tokio::test]
    async fn test_low_nitrogen_and_low_water_through_the_bus() {
        let mut harness = TestHarness::new();
        harness.bus.set_nitrogen(22);
        harness.bus.set_ph(7.2);
        harness.bus.set_water_level(10.0);
        let (mut control, status, _) = control_loop(harness.bus.clone());
        let mut link = harness.link.clone();

        control.tick(Some(&mut link), at(0)).await;
        assert!(control.controller().state(ActuatorId::FertilizerPump).on);
        assert_eq!(control.controller().alert_level(), Severity::Warning);
        assert!(!control.controller().state(ActuatorId::Buzzer).on);
        assert_eq!(status.lock().alert_level, Severity::Warning);
        harness.assert_report_field("ph", &serde_json::json!(7.2)).unwrap();
        harness.assert_report_field("nitrogen", &serde_json::json!(22)).unwrap();

        // A dead water sensor keeps the alert; the refilled tank clears it.
        harness.bus.fail(BusSource::WaterLevel, SensorError::Timeout);
        harness.bus.set_water_level(80.0);
        control.tick(Some(&mut link), at(5)).await;
        assert_eq!(control.controller().alert_level(), Severity::Warning);
        harness.assert_report_field("waterLevel", &serde_json::Value::Null).unwrap();

        harness.bus.heal(BusSource::WaterLevel);
        harness.bus.set_nitrogen(45);
        control.tick(Some(&mut link), at(10)).await;
        assert_eq!(control.controller().alert_level(), Severity::Clear);
        assert!(!control.controller().state(ActuatorId::FertilizerPump).on);
        assert_eq!(control.controller().indicator(), None);
    }

    #[tokio::test]
    async fn test_stalled_bridge_does_not_block_the_tick() {
        let bus = ScriptedBus::new();
        bus.set_uv_index(9.0);
        let (mut control, _, health) = control_loop(bus);

        // The bridge end stays open but never reads.
        let (bridge_end, controller_end) = duplex(16);
        let (reader, writer) = split(controller_end);
        let mut link = StreamLink::new(reader, writer, Duration::from_millis(20))
            .with_send_timeout(Duration::from_millis(50));

        let events = tokio::time::timeout(Duration::from_secs(2), control.tick(Some(&mut link), at(0)))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(control.controller().state(ActuatorId::Buzzer).on);
        assert_eq!(health.get_health().ticks, 1);

        // The next tick runs too, even though nothing drained the pipe.
        tokio::time::timeout(Duration::from_secs(2), control.tick(Some(&mut link), at(5)))
            .await
            .unwrap();
        assert_eq!(health.get_health().ticks, 2);
        drop(bridge_end);
    }

    #[test]
    fn test_command_line_applies_valid_clauses() {
        let (mut control, status, health) = control_loop(ScriptedBus::new());

        let events = control.handle_line("CMD:WPUMP,ON;FOO;LED,green,BLINK;", at(0));
        assert_eq!(events.len(), 2);
        assert!(control.controller().state(ActuatorId::WaterPump).on);
        assert!(status.lock().indicator.is_some());

        let h = health.get_health();
        assert_eq!(h.lines_received, 1);
        assert_eq!(h.clauses_skipped, 1);
        assert_eq!(h.events_emitted, 2);

        assert!(control.handle_line("{\"moisture\":1.0}", at(1)).is_empty());
    }

    #[test]
    fn test_buzz_deadline_and_shutdown() {
        let (mut control, _, _) = control_loop(ScriptedBus::new());

        control.handle_line("CMD:BUZZER,2;FPUMP,ON;", at(0));
        assert_eq!(control.next_deadline(), Some(at(2)));
        assert!(control.on_deadline(at(1)).is_empty());
        assert_eq!(control.on_deadline(at(2)).len(), 1);

        let events = control.shutdown(at(3));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Fertilizer Pump OFF (shutdown)");
    }
}
