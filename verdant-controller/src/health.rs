use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerHealth {
    pub uptime_seconds: u64,
    pub ticks: u64,
    pub bus_failures: u64,
    pub link_status: String,
    pub lines_received: u64,
    pub clauses_skipped: u64,
    pub events_emitted: u64,
}

/// Counters shared between the control loop and the status API.
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    ticks: Arc<AtomicU64>,
    bus_failures: Arc<AtomicU64>,
    lines_received: Arc<AtomicU64>,
    clauses_skipped: Arc<AtomicU64>,
    events_emitted: Arc<AtomicU64>,
    link_status: Arc<Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: Arc::new(AtomicU64::new(0)),
            bus_failures: Arc::new(AtomicU64::new(0)),
            lines_received: Arc::new(AtomicU64::new(0)),
            clauses_skipped: Arc::new(AtomicU64::new(0)),
            events_emitted: Arc::new(AtomicU64::new(0)),
            link_status: Arc::new(Mutex::new("waiting".to_string())),
        }
    }

    pub fn mark_link_connected(&self, peer: &str) {
        *self.link_status.lock() = format!("connected ({})", peer);
    }

    pub fn mark_link_disconnected(&self) {
        *self.link_status.lock() = "disconnected".to_string();
    }

    /// Counts one tick and returns the new total.
    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_bus_failures(&self, count: usize) {
        self.bus_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_clauses(&self, count: usize) {
        self.clauses_skipped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: usize) {
        self.events_emitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn get_health(&self) -> ControllerHealth {
        ControllerHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            bus_failures: self.bus_failures.load(Ordering::Relaxed),
            link_status: self.link_status.lock().clone(),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            clauses_skipped: self.clauses_skipped.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let h = self.get_health();
        info!(
            "[health] up {}s, {} ticks, {} bus failures, link {}, {} lines, {} skipped clauses, {} events",
            h.uptime_seconds, h.ticks, h.bus_failures, h.link_status, h.lines_received, h.clauses_skipped, h.events_emitted
        );
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
