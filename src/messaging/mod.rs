//! # Alert Messaging
//!
//! Transport seam for escalation alerts. The engine renders plain-text
//! alerts and hands them to an [`AlertTransport`]; wiring a concrete
//! transport (SMTP relay, chat webhook, paging bridge) is deployment
//! configuration, not engine logic. A missing transport is a hard
//! configuration error at send time, not at startup.

use async_trait::async_trait;

/// A rendered human-readable alert ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Error types for alert delivery
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Alert transport rejected the message: {0}")]
    Rejected(String),
    #[error("Alert transport is unreachable: {0}")]
    Unreachable(String),
}

/// Delivery seam implemented per deployment.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Deliver one alert. Implementations should not retry internally;
    /// the escalation cadence already re-sends on the remind schedule.
    async fn send(&self, message: &AlertMessage) -> Result<(), TransportError>;
}
