/**
 * HYSTERESIS CONTROLLER - Sole owner of the actuator states
 *
 * ROLE: Turns the latest reading set into actuator transitions using
 * dual-threshold bands, and applies decoded directives through the same
 * mutation path. Every transition yields an Event; nothing else may write
 * an ActuatorState.
 *
 * ALERTS: UV index and water level each carry a severity. The indicator
 * follows the worst of the two:
 * - Clear    -> LED off, buzzer off (unless a timed buzz is running)
 * - Warning  -> LED red, blinking
 * - Critical -> LED red, solid, buzzer on until the condition clears
 * While an alert is active, a remote LED request that conveys less than the
 * current level is ignored.
 *
 * TIME: the controller never reads a clock. Callers pass `now`; a timed
 * buzz stores its deadline and `expire(now)` ends it.
 */

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use verdant_protocol::{
    value_of, ActuatorId, ActuatorState, Color, Directive, Event, Quantity, Reading,
    DEFAULT_PUMP_INTENSITY,
};

const FULL_INTENSITY: u8 = 100;

/// `{low_on, high_off}` band: ON strictly below `low_on`, OFF strictly above
/// `high_off`, unchanged in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low_on: f64,
    pub high_off: f64,
}

impl Band {
    pub const fn new(low_on: f64, high_off: f64) -> Self {
        Self { low_on, high_off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvTiers {
    pub moderate: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub moisture: Band,
    pub nitrogen: Band,
    /// Low-water alert band: warning below `low_on`, cleared above `high_off`.
    pub water_level: Band,
    pub uv: UvTiers,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            moisture: Band::new(20.0, 30.0),
            nitrogen: Band::new(30.0, 40.0),
            water_level: Band::new(20.0, 25.0),
            uv: UvTiers { moderate: 3.0, critical: 8.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Clear,
    Warning,
    Critical,
}

/// What the RGB indicator shows while the alert LED is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub color: Color,
    pub blinking: bool,
}

impl Indicator {
    /// Alert level this indicator conveys: solid red is critical, blinking
    /// red a warning, any other color nothing.
    pub fn severity(self) -> Severity {
        match self {
            Indicator { color: Color::Red, blinking: false } => Severity::Critical,
            Indicator { color: Color::Red, blinking: true } => Severity::Warning,
            _ => Severity::Clear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub actuator: ActuatorId,
    pub before: ActuatorState,
    pub after: ActuatorState,
}

/// Result of one `evaluate`, `apply` or `expire` call.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub changes: Vec<StateChange>,
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    fn merge(&mut self, other: Outcome) {
        self.changes.extend(other.changes);
        self.events.extend(other.events);
    }
}

pub struct HysteresisController {
    thresholds: Thresholds,
    states: [ActuatorState; 4],
    indicator: Indicator,
    uv_severity: Severity,
    water_severity: Severity,
    alert_level: Severity,
    /// Set while a timed buzz runs. `None` with the buzzer on means continuous.
    buzzer_deadline: Option<OffsetDateTime>,
}

impl HysteresisController {
    /// Every actuator starts OFF.
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            states: [ActuatorState::OFF; 4],
            indicator: Indicator { color: Color::Red, blinking: false },
            uv_severity: Severity::Clear,
            water_severity: Severity::Clear,
            alert_level: Severity::Clear,
            buzzer_deadline: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn state(&self, actuator: ActuatorId) -> ActuatorState {
        self.states[actuator.index()]
    }

    pub fn states(&self) -> [(ActuatorId, ActuatorState); 4] {
        ActuatorId::ALL.map(|id| (id, self.state(id)))
    }

    /// Indicator shown right now, `None` while the alert LED is off.
    pub fn indicator(&self) -> Option<Indicator> {
        self.state(ActuatorId::AlertLed).on.then_some(self.indicator)
    }

    pub fn alert_level(&self) -> Severity {
        self.alert_level
    }

    /// When the running timed buzz ends, if any.
    pub fn next_deadline(&self) -> Option<OffsetDateTime> {
        self.buzzer_deadline
    }

    /// Runs the hysteresis rules against one tick's readings. A quantity
    /// missing from `readings` leaves its actuator and severity untouched.
    pub fn evaluate(&mut self, readings: &[Reading], now: OffsetDateTime) -> Outcome {
        let mut out = Outcome::default();

        if let Some(moisture) = value_of(readings, Quantity::Moisture) {
            let band = self.thresholds.moisture;
            self.pump_band(ActuatorId::WaterPump, moisture, band, "moisture", now, &mut out);
        }
        if let Some(nitrogen) = value_of(readings, Quantity::Nitrogen) {
            let band = self.thresholds.nitrogen;
            self.pump_band(ActuatorId::FertilizerPump, nitrogen, band, "nitrogen", now, &mut out);
        }

        if let Some(uv) = value_of(readings, Quantity::UvIndex) {
            let tiers = self.thresholds.uv;
            self.uv_severity = if uv >= tiers.critical {
                Severity::Critical
            } else if uv >= tiers.moderate {
                Severity::Warning
            } else {
                Severity::Clear
            };
        }
        if let Some(level) = value_of(readings, Quantity::WaterLevel) {
            let band = self.thresholds.water_level;
            if level < band.low_on {
                self.water_severity = Severity::Warning;
            } else if level > band.high_off {
                self.water_severity = Severity::Clear;
            }
        }

        let level = self.uv_severity.max(self.water_severity);
        if level != self.alert_level {
            self.alert_level = level;
            let reason = self.alert_reason();
            out.merge(self.enter_alert_level(level, &reason, now));
        }

        out
    }

    /// Applies one directive immediately, independent of tick timing.
    pub fn apply(&mut self, directive: Directive, now: OffsetDateTime) -> Outcome {
        let mut out = Outcome::default();

        match directive {
            Directive::SetActuator { actuator, on: true, intensity } => {
                let current = self.state(actuator);
                let target = ActuatorState::on_at(intensity);
                if actuator == ActuatorId::Buzzer {
                    self.buzzer_deadline = None;
                }
                if !current.on {
                    self.set(actuator, target, format!("{} ON via command", actuator), now, &mut out);
                } else if current.intensity != target.intensity {
                    let message = format!("{} intensity {}% via command", actuator, target.intensity);
                    self.set(actuator, target, message, now, &mut out);
                }
            }
            Directive::SetActuator { actuator, on: false, .. } => {
                if actuator == ActuatorId::Buzzer {
                    self.buzzer_deadline = None;
                }
                self.set(actuator, ActuatorState::OFF, format!("{} OFF via command", actuator), now, &mut out);
            }
            Directive::SetIntensity { actuator, intensity } => {
                let current = self.state(actuator);
                if !current.on {
                    debug!("intensity change for {} ignored while OFF", actuator);
                } else {
                    let target = ActuatorState::on_at(intensity);
                    let message = format!("{} intensity {}% via command", actuator, target.intensity);
                    self.set(actuator, target, message, now, &mut out);
                }
            }
            Directive::SetIndicator { color, blinking } => {
                let requested = Indicator { color, blinking };
                if requested.severity() < self.alert_level {
                    debug!("indicator {} ignored during {:?} alert", color, self.alert_level);
                } else {
                    let mode = if blinking { "BLINK" } else { "ON" };
                    let message = format!("Alert LED {} {} via command", color, mode);
                    self.show(requested, message, now, &mut out);
                }
            }
            Directive::Buzz { seconds: 0 } => {
                debug!("zero-length buzz ignored");
            }
            Directive::Buzz { seconds } => {
                let until = now + Duration::seconds(i64::from(seconds));
                let buzzer = self.state(ActuatorId::Buzzer);
                match self.buzzer_deadline {
                    // Continuous buzz already running; the timed one adds nothing.
                    None if buzzer.on => {}
                    Some(deadline) if buzzer.on => {
                        self.buzzer_deadline = Some(deadline.max(until));
                    }
                    _ => {
                        self.buzzer_deadline = Some(until);
                        let message = format!("Buzzer ON for {}s via command", seconds);
                        self.set(ActuatorId::Buzzer, ActuatorState::on_at(FULL_INTENSITY), message, now, &mut out);
                    }
                }
            }
        }

        out
    }

    /// Ends a timed buzz whose deadline has passed.
    pub fn expire(&mut self, now: OffsetDateTime) -> Outcome {
        let mut out = Outcome::default();
        match self.buzzer_deadline {
            Some(deadline) if now >= deadline => {
                self.buzzer_deadline = None;
                self.set(ActuatorId::Buzzer, ActuatorState::OFF, "Buzzer OFF (timer elapsed)", now, &mut out);
            }
            _ => {}
        }
        out
    }

    /// Switches everything OFF, e.g. before the process exits.
    pub fn all_off(&mut self, now: OffsetDateTime) -> Outcome {
        let mut out = Outcome::default();
        self.buzzer_deadline = None;
        for id in ActuatorId::ALL {
            self.set(id, ActuatorState::OFF, format!("{} OFF (shutdown)", id), now, &mut out);
        }
        out
    }

    fn pump_band(
        &mut self,
        pump: ActuatorId,
        value: f64,
        band: Band,
        quantity: &str,
        now: OffsetDateTime,
        out: &mut Outcome,
    ) {
        let current = self.state(pump);
        if !current.on && value < band.low_on {
            let message = format!("{} ON ({} below threshold)", pump, quantity);
            self.set(pump, ActuatorState::on_at(DEFAULT_PUMP_INTENSITY), message, now, out);
        } else if current.on && value > band.high_off {
            let message = format!("{} OFF ({} above threshold)", pump, quantity);
            self.set(pump, ActuatorState::OFF, message, now, out);
        }
    }

    fn enter_alert_level(&mut self, level: Severity, reason: &str, now: OffsetDateTime) -> Outcome {
        let mut out = Outcome::default();
        let buzzer = self.state(ActuatorId::Buzzer);
        let continuous_buzz = buzzer.on && self.buzzer_deadline.is_none();

        match level {
            Severity::Clear => {
                self.set(ActuatorId::AlertLed, ActuatorState::OFF, "Alert LED OFF (alerts cleared)", now, &mut out);
                if continuous_buzz {
                    self.set(ActuatorId::Buzzer, ActuatorState::OFF, "Buzzer OFF (alerts cleared)", now, &mut out);
                }
            }
            Severity::Warning => {
                let indicator = Indicator { color: Color::Red, blinking: true };
                self.show(indicator, format!("Alert LED red BLINK ({})", reason), now, &mut out);
                if continuous_buzz {
                    self.set(ActuatorId::Buzzer, ActuatorState::OFF, format!("Buzzer OFF ({})", reason), now, &mut out);
                }
            }
            Severity::Critical => {
                let indicator = Indicator { color: Color::Red, blinking: false };
                self.show(indicator, format!("Alert LED red ON ({})", reason), now, &mut out);
                // A running timed buzz becomes continuous.
                self.buzzer_deadline = None;
                if !buzzer.on {
                    let message = format!("Buzzer ON ({})", reason);
                    self.set(ActuatorId::Buzzer, ActuatorState::on_at(FULL_INTENSITY), message, now, &mut out);
                }
            }
        }
        out
    }

    fn alert_reason(&self) -> String {
        let mut parts = Vec::new();
        match self.uv_severity {
            Severity::Critical => parts.push("UV critical"),
            Severity::Warning => parts.push("UV moderate"),
            Severity::Clear => {}
        }
        if self.water_severity != Severity::Clear {
            parts.push("water level low");
        }
        parts.join(", ")
    }

    /// Turns the LED on with `indicator`. Emits one event if either the LED
    /// state or what it shows changed.
    fn show(&mut self, indicator: Indicator, message: String, now: OffsetDateTime, out: &mut Outcome) {
        let before = self.state(ActuatorId::AlertLed);
        let after = ActuatorState::on_at(FULL_INTENSITY);
        if before == after && self.indicator == indicator {
            return;
        }
        self.indicator = indicator;
        self.states[ActuatorId::AlertLed.index()] = after;
        if before != after {
            out.changes.push(StateChange { actuator: ActuatorId::AlertLed, before, after });
        }
        out.events.push(Event::new(now, message));
    }

    fn set(
        &mut self,
        actuator: ActuatorId,
        after: ActuatorState,
        message: impl Into<String>,
        now: OffsetDateTime,
        out: &mut Outcome,
    ) {
        let before = self.state(actuator);
        if before == after {
            return;
        }
        self.states[actuator.index()] = after;
        out.changes.push(StateChange { actuator, before, after });
        out.events.push(Event::new(now, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_devkit::test_utils::{at, readings};
    use verdant_protocol::decode;

    fn controller() -> HysteresisController {
        HysteresisController::new(Thresholds::default())
    }

    #[test]
    fn test_dry_soil_turns_pump_on_with_one_event() {
        let mut ctl = controller();
        let out = ctl.evaluate(&readings(&[(Quantity::Moisture, 15.0)]), at(0));

        assert_eq!(ctl.state(ActuatorId::WaterPump), ActuatorState { on: true, intensity: 90 });
        assert_eq!(out.events.len(), 1);
        assert!(out.events[0].message.contains("ON"));
        assert_eq!(out.events[0].message, "Water Pump ON (moisture below threshold)");
        assert_eq!(out.events[0].timestamp, at(0));
    }

    #[test]
    fn test_dead_band_keeps_pump_on() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::Moisture, 15.0)]), at(0));

        let out = ctl.evaluate(&readings(&[(Quantity::Moisture, 25.0)]), at(5));
        assert!(out.is_empty());
        assert!(ctl.state(ActuatorId::WaterPump).on);
    }

    #[test]
    fn test_moisture_sweep_follows_band() {
        let mut ctl = controller();
        let band = ctl.thresholds().moisture;
        let mut seconds = 0;

        // Falling from 40 to 0 then rising back: ON only below 20, OFF only above 30.
        let falling = (0..=80).rev().map(|i| f64::from(i) * 0.5);
        let rising = (0..=80).map(|i| f64::from(i) * 0.5);
        for m in falling.chain(rising) {
            let was_on = ctl.state(ActuatorId::WaterPump).on;
            ctl.evaluate(&readings(&[(Quantity::Moisture, m)]), at(seconds));
            let is_on = ctl.state(ActuatorId::WaterPump).on;
            seconds += 5;

            if !was_on {
                assert_eq!(is_on, m < band.low_on, "m = {}", m);
            } else {
                assert_eq!(!is_on, m > band.high_off, "m = {}", m);
            }
        }
    }

    #[test]
    fn test_repeated_evaluation_is_idempotent() {
        let mut ctl = controller();
        let set = readings(&[
            (Quantity::Moisture, 10.0),
            (Quantity::Nitrogen, 20.0),
            (Quantity::UvIndex, 9.0),
            (Quantity::WaterLevel, 10.0),
        ]);
        assert!(!ctl.evaluate(&set, at(0)).is_empty());
        for tick in 1..10 {
            assert!(ctl.evaluate(&set, at(tick * 5)).is_empty());
        }
    }

    #[test]
    fn test_fertilizer_pump_band() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::Nitrogen, 29.0)]), at(0));
        assert!(ctl.state(ActuatorId::FertilizerPump).on);

        ctl.evaluate(&readings(&[(Quantity::Nitrogen, 40.0)]), at(5));
        assert!(ctl.state(ActuatorId::FertilizerPump).on);

        let out = ctl.evaluate(&readings(&[(Quantity::Nitrogen, 41.0)]), at(10));
        assert!(!ctl.state(ActuatorId::FertilizerPump).on);
        assert_eq!(out.events[0].message, "Fertilizer Pump OFF (nitrogen above threshold)");
    }

    #[test]
    fn test_missing_reading_keeps_previous_decision() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::Moisture, 10.0), (Quantity::UvIndex, 9.0)]), at(0));

        let out = ctl.evaluate(&readings(&[(Quantity::Temperature, 22.0)]), at(5));
        assert!(out.is_empty());
        assert!(ctl.state(ActuatorId::WaterPump).on);
        assert_eq!(ctl.alert_level(), Severity::Critical);
    }

    #[test]
    fn test_critical_uv_wins_over_normal_water() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::UvIndex, 9.0), (Quantity::WaterLevel, 50.0)]), at(0));

        assert_eq!(ctl.alert_level(), Severity::Critical);
        assert!(ctl.state(ActuatorId::AlertLed).on);
        assert!(ctl.state(ActuatorId::Buzzer).on);
        assert_eq!(ctl.indicator(), Some(Indicator { color: Color::Red, blinking: false }));
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn test_low_water_lights_led_without_buzzer() {
        let mut ctl = controller();
        let out = ctl.evaluate(&readings(&[(Quantity::UvIndex, 2.0), (Quantity::WaterLevel, 10.0)]), at(0));

        assert!(ctl.state(ActuatorId::AlertLed).on);
        assert!(!ctl.state(ActuatorId::Buzzer).on);
        assert_eq!(ctl.indicator(), Some(Indicator { color: Color::Red, blinking: true }));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].message, "Alert LED red BLINK (water level low)");
    }

    #[test]
    fn test_alert_tiers_escalate_and_clear() {
        let mut ctl = controller();

        ctl.evaluate(&readings(&[(Quantity::UvIndex, 5.0)]), at(0));
        assert_eq!(ctl.alert_level(), Severity::Warning);
        assert!(!ctl.state(ActuatorId::Buzzer).on);

        let out = ctl.evaluate(&readings(&[(Quantity::UvIndex, 8.0)]), at(5));
        assert_eq!(ctl.alert_level(), Severity::Critical);
        assert!(ctl.state(ActuatorId::Buzzer).on);
        // LED was already on: the mode change is an event, not a state change.
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.events.len(), 2);

        ctl.evaluate(&readings(&[(Quantity::UvIndex, 4.0)]), at(10));
        assert_eq!(ctl.alert_level(), Severity::Warning);
        assert!(!ctl.state(ActuatorId::Buzzer).on);

        let out = ctl.evaluate(&readings(&[(Quantity::UvIndex, 1.0)]), at(15));
        assert_eq!(ctl.alert_level(), Severity::Clear);
        assert_eq!(ctl.indicator(), None);
        assert_eq!(out.events[0].message, "Alert LED OFF (alerts cleared)");
    }

    #[test]
    fn test_water_alert_has_its_own_band() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::WaterLevel, 19.0)]), at(0));
        assert_eq!(ctl.alert_level(), Severity::Warning);

        ctl.evaluate(&readings(&[(Quantity::WaterLevel, 22.0)]), at(5));
        assert_eq!(ctl.alert_level(), Severity::Warning);

        ctl.evaluate(&readings(&[(Quantity::WaterLevel, 26.0)]), at(10));
        assert_eq!(ctl.alert_level(), Severity::Clear);
    }

    #[test]
    fn test_command_directives_apply_in_order() {
        let mut ctl = controller();
        let batch = decode("CMD:WPUMP,ON;FOO;BUZZER,3;");
        let events: Vec<String> = batch
            .directives
            .into_iter()
            .flat_map(|d| ctl.apply(d, at(0)).events)
            .map(|e| e.message)
            .collect();

        assert_eq!(events, vec!["Water Pump ON via command", "Buzzer ON for 3s via command"]);
        assert_eq!(ctl.next_deadline(), Some(at(3)));
    }

    #[test]
    fn test_intensity_change_only_while_on() {
        let mut ctl = controller();
        let speed = Directive::SetIntensity { actuator: ActuatorId::WaterPump, intensity: 40 };

        assert!(ctl.apply(speed, at(0)).is_empty());
        assert_eq!(ctl.state(ActuatorId::WaterPump), ActuatorState::OFF);

        ctl.apply(Directive::switch(ActuatorId::WaterPump, true), at(1));
        let out = ctl.apply(speed, at(2));
        assert_eq!(ctl.state(ActuatorId::WaterPump), ActuatorState { on: true, intensity: 40 });
        assert_eq!(out.events[0].message, "Water Pump intensity 40% via command");

        let explicit = Directive::SetActuator { actuator: ActuatorId::WaterPump, on: true, intensity: 70 };
        ctl.apply(explicit, at(3));
        assert_eq!(ctl.state(ActuatorId::WaterPump).intensity, 70);
    }

    #[test]
    fn test_redundant_command_emits_nothing() {
        let mut ctl = controller();
        assert!(ctl.apply(Directive::switch(ActuatorId::FertilizerPump, false), at(0)).is_empty());

        ctl.apply(Directive::switch(ActuatorId::FertilizerPump, true), at(1));
        assert!(ctl.apply(Directive::switch(ActuatorId::FertilizerPump, true), at(2)).is_empty());
    }

    #[test]
    fn test_indicator_override_and_mode_change() {
        let mut ctl = controller();
        let out = ctl.apply(Directive::SetIndicator { color: Color::Green, blinking: true }, at(0));
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.events[0].message, "Alert LED green BLINK via command");

        let out = ctl.apply(Directive::SetIndicator { color: Color::Blue, blinking: false }, at(1));
        assert!(out.changes.is_empty());
        assert_eq!(out.events.len(), 1);
        assert_eq!(ctl.indicator(), Some(Indicator { color: Color::Blue, blinking: false }));
    }

    #[test]
    fn test_remote_indicator_cannot_mask_critical_alert() {
        let mut ctl = controller();
        let uv = readings(&[(Quantity::UvIndex, 9.0)]);
        ctl.evaluate(&uv, at(0));
        let solid_red = Some(Indicator { color: Color::Red, blinking: false });

        // Moisture-low response from the service: LED,green,BLINK.
        let batch = decode("CMD:LED,green,BLINK;WPUMP,ON;LED,red,BLINK;");
        let events: Vec<Event> = batch.directives.into_iter().flat_map(|d| ctl.apply(d, at(1)).events).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Water Pump ON via command");
        assert_eq!(ctl.indicator(), solid_red);

        ctl.evaluate(&uv, at(5));
        assert_eq!(ctl.alert_level(), Severity::Critical);
        assert_eq!(ctl.indicator(), solid_red);
        assert!(ctl.indicator().is_some_and(|i| i.severity() >= ctl.alert_level()));
    }

    #[test]
    fn test_remote_indicator_during_warning() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::WaterLevel, 10.0)]), at(0));
        assert_eq!(ctl.alert_level(), Severity::Warning);

        let out = ctl.apply(Directive::SetIndicator { color: Color::Blue, blinking: false }, at(1));
        assert!(out.is_empty());
        assert_eq!(ctl.indicator(), Some(Indicator { color: Color::Red, blinking: true }));

        // Escalating to solid red is allowed.
        let out = ctl.apply(Directive::SetIndicator { color: Color::Red, blinking: false }, at(2));
        assert_eq!(out.events[0].message, "Alert LED red ON via command");
        assert_eq!(ctl.indicator().map(Indicator::severity), Some(Severity::Critical));

        // Once the tank is refilled, remote colors are shown again.
        ctl.evaluate(&readings(&[(Quantity::WaterLevel, 60.0)]), at(5));
        assert_eq!(ctl.indicator(), None);
        ctl.apply(Directive::SetIndicator { color: Color::Blue, blinking: false }, at(6));
        assert_eq!(ctl.indicator(), Some(Indicator { color: Color::Blue, blinking: false }));
    }

    #[test]
    fn test_remote_buzz_during_critical_keeps_continuous_buzz() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::UvIndex, 9.0)]), at(0));

        let out = ctl.apply(Directive::Buzz { seconds: 3 }, at(1));
        assert!(out.is_empty());
        assert!(ctl.state(ActuatorId::Buzzer).on);
        assert_eq!(ctl.next_deadline(), None);
        assert!(ctl.expire(at(10)).is_empty());
        assert!(ctl.state(ActuatorId::Buzzer).on);
    }

    #[test]
    fn test_timed_buzz_expires() {
        let mut ctl = controller();
        ctl.apply(Directive::Buzz { seconds: 3 }, at(0));
        assert!(ctl.expire(at(2)).is_empty());

        // A longer buzz extends the deadline, a shorter one does not shorten it.
        ctl.apply(Directive::Buzz { seconds: 5 }, at(1));
        ctl.apply(Directive::Buzz { seconds: 1 }, at(2));
        assert_eq!(ctl.next_deadline(), Some(at(6)));

        let out = ctl.expire(at(6));
        assert!(!ctl.state(ActuatorId::Buzzer).on);
        assert_eq!(out.events[0].message, "Buzzer OFF (timer elapsed)");
        assert_eq!(ctl.next_deadline(), None);
    }

    #[test]
    fn test_zero_buzz_is_noop() {
        let mut ctl = controller();
        assert!(ctl.apply(Directive::Buzz { seconds: 0 }, at(0)).is_empty());
        assert!(!ctl.state(ActuatorId::Buzzer).on);
    }

    #[test]
    fn test_critical_alert_makes_timed_buzz_continuous() {
        let mut ctl = controller();
        ctl.apply(Directive::Buzz { seconds: 3 }, at(0));
        ctl.evaluate(&readings(&[(Quantity::UvIndex, 10.0)]), at(1));

        assert_eq!(ctl.next_deadline(), None);
        assert!(ctl.expire(at(10)).is_empty());
        assert!(ctl.state(ActuatorId::Buzzer).on);

        ctl.evaluate(&readings(&[(Quantity::UvIndex, 0.5)]), at(15));
        assert!(!ctl.state(ActuatorId::Buzzer).on);
    }

    #[test]
    fn test_all_off_emits_one_event_per_running_actuator() {
        let mut ctl = controller();
        ctl.evaluate(&readings(&[(Quantity::Moisture, 5.0), (Quantity::UvIndex, 9.0)]), at(0));

        let out = ctl.all_off(at(1));
        assert_eq!(out.events.len(), 3);
        assert!(ActuatorId::ALL.iter().all(|id| !ctl.state(*id).on));
    }
}
