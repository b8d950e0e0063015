/**
 * STATUS API - Read-only HTTP view of the actuator board
 *
 * ROLE: Lets a bench operator see what the board is doing without a serial
 * console. Serves copies only: the control loop publishes a snapshot after
 * each mutation, handlers never touch the controller.
 *
 * ROUTES:
 * - GET /health          -> "ok"
 * - GET /system/health   -> loop counters and link status
 * - GET /actuators       -> actuator states, indicator, alert level
 */

use axum::{extract::State, routing::get, Json, Router};

use crate::health::{ControllerHealth, HealthTracker};
use crate::state::{Shared, StatusSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub status: Shared<StatusSnapshot>,
    pub health_tracker: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/actuators", get(get_actuators))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<ControllerHealth> {
    Json(app.health_tracker.get_health())
}

// GET /actuators
async fn get_actuators(State(app): State<AppState>) -> Json<StatusSnapshot> {
    Json(app.status.lock().clone())
}
