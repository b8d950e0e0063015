use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use verdant_protocol::{ActuatorId, ActuatorState};

use crate::controller::{HysteresisController, Indicator, Severity};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Read-only copy of the controller, published for the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub actuators: Vec<ActuatorView>,
    pub indicator: Option<Indicator>,
    pub alert_level: Severity,
    pub buzzer_until: Option<String>, // RFC3339
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActuatorView {
    pub actuator: ActuatorId,
    pub label: &'static str,
    #[serde(flatten)]
    pub state: ActuatorState,
}

impl StatusSnapshot {
    pub fn capture(controller: &HysteresisController, now: OffsetDateTime) -> Self {
        let actuators = controller
            .states()
            .into_iter()
            .map(|(actuator, state)| ActuatorView { actuator, label: actuator.label(), state })
            .collect();

        Self {
            actuators,
            indicator: controller.indicator(),
            alert_level: controller.alert_level(),
            buzzer_until: controller.next_deadline().and_then(|t| t.format(&Rfc3339).ok()),
            updated_at: now.format(&Rfc3339).ok(),
        }
    }
}
