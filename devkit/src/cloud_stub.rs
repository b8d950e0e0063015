/*!
Fake cloud service for bridge development

Serves the two routes the bridge consumes, on an ephemeral local port:
- `POST /api/sensorData`                  -> stores the report document
- `GET  /api/sensorCommand/{alert}`       -> scripted alert check response

Unscripted alerts answer `{"success": false}` like a quiet farm would.
`SilentServer` accepts connections and never answers, for timeout tests.
*/

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
struct CloudState {
    reports: Arc<Mutex<Vec<Value>>>,
    alert_requests: Arc<Mutex<Vec<String>>>,
    alerts: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    report_status: Arc<Mutex<Option<StatusCode>>>,
}

pub struct FakeCloud {
    addr: SocketAddr,
    state: CloudState,
    handle: JoinHandle<()>,
}

impl FakeCloud {
    /// Starts the service on 127.0.0.1 with a random port.
    pub async fn start() -> Result<Self> {
        let state = CloudState::default();
        let app = Router::new()
            .route("/api/sensorData", post(receive_report))
            .route("/api/sensorCommand/{alert}", get(check_alert))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[fake-cloud] server stopped: {}", e);
            }
        });

        log::info!("☁️ [fake-cloud] listening on http://{}", addr);
        Ok(Self { addr, state, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Scripts a 200 response for one alert category.
    pub fn set_alert(&self, alert: &str, body: Value) {
        self.set_alert_with_status(alert, 200, body);
    }

    pub fn set_alert_with_status(&self, alert: &str, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.state.alerts.lock().insert(alert.to_string(), (status, body));
    }

    /// Forces the status returned for report uploads.
    pub fn set_report_status(&self, status: u16) {
        *self.state.report_status.lock() = StatusCode::from_u16(status).ok();
    }

    pub fn reports(&self) -> Vec<Value> {
        self.state.reports.lock().clone()
    }

    /// Alert names in the order they were checked.
    pub fn alert_requests(&self) -> Vec<String> {
        self.state.alert_requests.lock().clone()
    }

    pub fn clear(&self) {
        self.state.reports.lock().clear();
        self.state.alert_requests.lock().clear();
    }
}

impl Drop for FakeCloud {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn receive_report(State(state): State<CloudState>, body: String) -> (StatusCode, Json<Value>) {
    let Ok(report) = serde_json::from_str::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid JSON" })));
    };
    state.reports.lock().push(report);

    let status = state.report_status.lock().unwrap_or(StatusCode::CREATED);
    (status, Json(json!({ "success": status.is_success() })))
}

async fn check_alert(State(state): State<CloudState>, Path(alert): Path<String>) -> (StatusCode, Json<Value>) {
    state.alert_requests.lock().push(alert.clone());

    match state.alerts.lock().get(&alert) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (
            StatusCode::OK,
            Json(json!({ "success": false, "message": format!("No critical {} event", alert) })),
        ),
    }
}

/// Accepts TCP connections and holds them open without ever replying.
pub struct SilentServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Ok(Self { addr, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Response bodies shaped like the real alert check service.
pub struct CloudMessageBuilder;

impl CloudMessageBuilder {
    /// Critical alert: red blinking LED and a 3 s buzz. The service omits
    /// the top-level `success` flag on these.
    pub fn critical_alert(message: &str) -> Value {
        json!({
            "buzzer": { "success": true, "time": 3 },
            "led": { "success": true, "color": "red", "blink": true },
            "message": message
        })
    }

    /// Low water tank: red blinking LED only.
    pub fn water_tank_low() -> Value {
        json!({
            "success": true,
            "time": 3,
            "led": { "success": true, "color": "red", "blink": true },
            "message": "Water tank level is low, fill the tank"
        })
    }

    /// Irrigation request: water pump ON with a green blinking LED.
    pub fn water_pump_on() -> Value {
        json!({
            "success": true,
            "waterPump": { "on": true },
            "led": { "success": true, "color": "green", "blink": true }
        })
    }

    /// Fertilizer request: fertilizer pump ON with a steady blue LED.
    pub fn fertilizer_pump_on() -> Value {
        json!({
            "success": true,
            "fertilizerPump": { "on": true },
            "led": { "success": true, "color": "blue", "on": true }
        })
    }

    pub fn no_event(alert: &str) -> Value {
        json!({ "success": false, "message": format!("No critical {} event", alert) })
    }
}
