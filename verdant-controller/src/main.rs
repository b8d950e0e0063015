/**
 * VERDANT CONTROLLER - Actuator board entry point
 *
 * ROLE: Owns the sensors and actuators. Samples the bus every tick, drives
 * the pumps and alert outputs through the hysteresis controller, reports
 * readings to the bridge board and applies the commands it sends back.
 *
 * SCHEDULING: one control loop, one task. The loop wakes on the tick, on a
 * received link line, on the buzzer deadline or on Ctrl-C, and handles each
 * wake-up to completion before waiting again. The status API runs beside it
 * and only reads published snapshots.
 */

mod config;
mod control_loop;
mod controller;
mod health;
mod http;
mod sampler;
mod sim_bus;
mod state;

use anyhow::{Context, Result};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use verdant_protocol::{LinkError, LinkTransport, StreamLink};

use crate::config::load_config;
use crate::control_loop::ControlLoop;
use crate::controller::HysteresisController;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::sampler::SensorSampler;
use crate::sim_bus::SimulatedBus;
use crate::state::{new_state, StatusSnapshot};

type TcpLink = StreamLink<OwnedReadHalf, OwnedWriteHalf>;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    let health = HealthTracker::new();
    let status = new_state(StatusSnapshot::default());

    if let Some(http_cfg) = cfg.http.clone() {
        let listener = TcpListener::bind(&http_cfg.listen)
            .await
            .with_context(|| format!("binding status API on {}", http_cfg.listen))?;
        let app = http::build_router(AppState { status: status.clone(), health_tracker: health.clone() });
        info!("[controller] status API on http://{}", http_cfg.listen);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("[controller] status API stopped: {}", e);
            }
        });
    }

    let listener = TcpListener::bind(&cfg.link.listen)
        .await
        .with_context(|| format!("binding link listener on {}", cfg.link.listen))?;
    info!("[controller] waiting for the bridge on {}", cfg.link.listen);

    let sampler = SensorSampler::new(SimulatedBus::new(), cfg.bus_timeout());
    let controller = HysteresisController::new(cfg.thresholds.clone());
    let mut control = ControlLoop::new(sampler, controller, health.clone(), status, cfg.health_every_ticks);

    let mut link: Option<TcpLink> = None;
    let mut ticker = tokio::time::interval(cfg.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let deadline = control.next_deadline();

        tokio::select! {
            _ = ticker.tick() => {
                control.tick(link.as_mut(), OffsetDateTime::now_utc()).await;
            }
            accepted = listener.accept(), if link.is_none() => match accepted {
                Ok((socket, peer)) => {
                    info!("[controller] bridge connected from {}", peer);
                    health.mark_link_connected(&peer.to_string());
                    let (reader, writer) = socket.into_split();
                    link = Some(StreamLink::new(reader, writer, cfg.receive_timeout()).with_send_timeout(cfg.send_timeout()));
                }
                Err(e) => warn!("[controller] accept failed: {}", e),
            },
            received = receive(&mut link) => match received {
                Ok(Some(line)) => {
                    control.handle_line(&line, OffsetDateTime::now_utc());
                }
                Ok(None) => {}
                Err(e) => {
                    match e {
                        LinkError::Closed => info!("[controller] bridge disconnected"),
                        other => warn!("[controller] link error: {}", other),
                    }
                    link = None;
                    health.mark_link_disconnected();
                }
            },
            _ = sleep_until(deadline), if deadline.is_some() => {
                control.on_deadline(OffsetDateTime::now_utc());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("[controller] shutting down");
                control.shutdown(OffsetDateTime::now_utc());
                break;
            }
        }
    }

    Ok(())
}

/// Next line from the attached peer; never completes while no peer is attached.
async fn receive(link: &mut Option<TcpLink>) -> Result<Option<String>, LinkError> {
    match link {
        Some(link) => link.try_receive().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<OffsetDateTime>) {
    let Some(deadline) = deadline else {
        return std::future::pending().await;
    };
    let remaining = deadline - OffsetDateTime::now_utc();
    let wait = Duration::try_from(remaining).unwrap_or(Duration::ZERO);
    tokio::time::sleep(wait).await;
}
