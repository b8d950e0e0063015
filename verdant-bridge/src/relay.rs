//! Relay step of the bridge board.
//!
//! Drains the link, keeps only the newest report line, validates it,
//! publishes it, polls the alert checks and forwards the resulting command
//! batch. Strictly sequential: the poll never starts before the publish
//! finished.

use tracing::{debug, info, warn};
use verdant_protocol::{encode_batch, LinkError, LinkTransport, ReadingSource, SensorReport};

use crate::gateway::{CloudGateway, HttpTransport, Outcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResult {
    /// No report arrived.
    Idle,
    /// The newest report was not a valid document and was dropped.
    Invalid,
    Relayed { outcome: Outcome, forwarded: usize },
}

pub struct Relay<T> {
    gateway: CloudGateway<T>,
}

impl<T: HttpTransport> Relay<T> {
    pub fn new(gateway: CloudGateway<T>) -> Self {
        Self { gateway }
    }

    pub async fn step<L: LinkTransport>(&mut self, link: &mut L) -> Result<RelayResult, LinkError> {
        let mut latest: Option<String> = None;
        while let Some(line) = link.try_receive().await? {
            if !line.trim_start().starts_with('{') {
                debug!("[relay] ignoring non-report line: {}", line);
                continue;
            }
            if latest.replace(line).is_some() {
                debug!("[relay] stale report dropped");
            }
        }

        match latest {
            Some(report) => self.relay(&report, link).await,
            None => Ok(RelayResult::Idle),
        }
    }

    /// Publishes one report line and forwards the alert actions it triggers.
    pub async fn relay<L: LinkTransport>(&mut self, report: &str, link: &mut L) -> Result<RelayResult, LinkError> {
        match SensorReport::parse(report) {
            Ok(parsed) => debug!(
                "[relay] report with {} readings",
                parsed.to_readings(ReadingSource::RemoteReport).len()
            ),
            Err(e) => {
                warn!("[relay] invalid report dropped: {}", e);
                return Ok(RelayResult::Invalid);
            }
        }

        let outcome = self.gateway.publish(report).await;
        if outcome == Outcome::Unreachable {
            return Ok(RelayResult::Relayed { outcome, forwarded: 0 });
        }

        let directives = self.gateway.poll_alerts().await;
        if directives.is_empty() {
            return Ok(RelayResult::Relayed { outcome, forwarded: 0 });
        }

        match encode_batch(&directives) {
            Ok(batch) => {
                info!("[relay] forwarding {}", batch);
                match link.send(&batch).await {
                    Ok(()) => Ok(RelayResult::Relayed { outcome, forwarded: directives.len() }),
                    Err(LinkError::Timeout(limit)) => {
                        warn!("[relay] command batch dropped, link stalled for {:?}", limit);
                        Ok(RelayResult::Relayed { outcome, forwarded: 0 })
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                warn!("[relay] command batch not encodable: {}", e);
                Ok(RelayResult::Relayed { outcome, forwarded: 0 })
            }
        }
    }
}
