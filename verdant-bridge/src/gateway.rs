//! Cloud gateway
//!
//! Talks to the farm service over HTTP:
//! - `POST {base}/api/sensorData` with the report document
//! - `GET  {base}/api/sensorCommand/{alert}` once per alert category
//!
//! Every request is bounded by the configured timeout. Failures are logged
//! and absorbed here; nothing is retried within a tick.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use verdant_protocol::Directive;

use crate::alerts::{translate, AlertResponse};
use crate::config::CloudConfig;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no network association")]
    NotAssociated,
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Result of one report upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Rejected(u16),
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw HTTP plumbing under the gateway.
pub trait HttpTransport {
    /// False while the radio has no network. Checked before every request.
    fn is_associated(&self) -> bool {
        true
    }

    fn post_json(&self, url: &str, body: &str) -> impl Future<Output = Result<HttpReply, GatewayError>>;

    fn get(&self, url: &str) -> impl Future<Output = Result<HttpReply, GatewayError>>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    async fn finish(response: Result<reqwest::Response, reqwest::Error>) -> Result<HttpReply, GatewayError> {
        let response = response.map_err(map_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest)?;
        Ok(HttpReply { status, body })
    }
}

fn map_reqwest(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Request(e.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &str) -> Result<HttpReply, GatewayError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await;
        Self::finish(response).await
    }

    async fn get(&self, url: &str) -> Result<HttpReply, GatewayError> {
        Self::finish(self.client.get(url).send().await).await
    }
}

pub struct CloudGateway<T> {
    transport: T,
    base_url: String,
    alerts: Vec<String>,
    timeout: Duration,
}

impl<T: HttpTransport> CloudGateway<T> {
    pub fn new(transport: T, config: &CloudConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            alerts: config.alerts.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Uploads one report document. Never retried.
    pub async fn publish(&self, report: &str) -> Outcome {
        let url = format!("{}/api/sensorData", self.base_url);
        match self.request(self.transport.post_json(&url, report)).await {
            Ok(reply) if reply.is_success() => {
                debug!("[gateway] report delivered ({})", reply.status);
                Outcome::Delivered
            }
            Ok(reply) => {
                warn!("[gateway] report rejected with HTTP {}", reply.status);
                Outcome::Rejected(reply.status)
            }
            Err(e) => {
                warn!("[gateway] report not delivered: {}", e);
                Outcome::Unreachable
            }
        }
    }

    /// Checks every alert category in order and collects the directives of
    /// the positive ones. A failed check contributes nothing.
    pub async fn poll_alerts(&self) -> Vec<Directive> {
        let mut directives = Vec::new();
        for alert in &self.alerts {
            match self.check(alert).await {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    info!("[gateway] {} requested {} action(s)", alert, found.len());
                    directives.extend(found);
                }
                Err(e) => warn!("[gateway] {} check failed: {}", alert, e),
            }
        }
        directives
    }

    async fn check(&self, alert: &str) -> Result<Vec<Directive>, GatewayError> {
        let url = format!("{}/api/sensorCommand/{}", self.base_url, alert);
        let reply = self.request(self.transport.get(&url)).await?;
        if !reply.is_success() {
            return Err(GatewayError::Status(reply.status));
        }
        let response: AlertResponse = serde_json::from_str(&reply.body)?;
        if let Some(message) = response.message.as_deref().filter(|_| response.is_positive()) {
            info!("[gateway] {}: {}", alert, message);
        }
        Ok(translate(&response))
    }

    async fn request(
        &self,
        call: impl Future<Output = Result<HttpReply, GatewayError>>,
    ) -> Result<HttpReply, GatewayError> {
        if !self.transport.is_associated() {
            return Err(GatewayError::NotAssociated);
        }
        tokio::time::timeout(self.timeout, call).await.unwrap_or(Err(GatewayError::Timeout))
    }
}
