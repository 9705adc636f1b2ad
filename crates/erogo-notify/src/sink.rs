//! # Notification Sinks
//!
//! The seam to the external delivery collaborator. Sinks accept payloads;
//! what happens afterwards (persistence, SMTP, push) is not the engine's
//! concern. Sink failures are reported to the caller so the service layer
//! can log and count them — they must never fail a committed transition.

use parking_lot::Mutex;
use thiserror::Error;

use crate::dispatch::NotificationPayload;
use crate::settings::DeliveryChannel;

/// Delivery to a sink failed.
#[derive(Error, Debug)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Accepts notification payloads for one or more channels.
pub trait NotificationSink: Send + Sync {
    /// Deliver a payload on the given channel.
    fn deliver(
        &self,
        channel: DeliveryChannel,
        payload: &NotificationPayload,
    ) -> Result<(), SinkError>;
}

/// Sink that records every payload in memory. Used in tests and in
/// development mode, where in-app notifications have no external store.
#[derive(Debug, Default)]
pub struct InMemorySink {
    delivered: Mutex<Vec<(DeliveryChannel, NotificationPayload)>>,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All payloads delivered so far, in order.
    pub fn delivered(&self) -> Vec<(DeliveryChannel, NotificationPayload)> {
        self.delivered.lock().clone()
    }

    /// Number of payloads delivered so far.
    pub fn len(&self) -> usize {
        self.delivered.lock().len()
    }

    /// Whether nothing has been delivered yet.
    pub fn is_empty(&self) -> bool {
        self.delivered.lock().is_empty()
    }
}

impl NotificationSink for InMemorySink {
    fn deliver(
        &self,
        channel: DeliveryChannel,
        payload: &NotificationPayload,
    ) -> Result<(), SinkError> {
        self.delivered.lock().push((channel, payload.clone()));
        Ok(())
    }
}

/// Sink that logs payloads instead of delivering them. The default email
/// sink when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn deliver(
        &self,
        channel: DeliveryChannel,
        payload: &NotificationPayload,
    ) -> Result<(), SinkError> {
        tracing::info!(
            channel = channel.as_str(),
            recipient = %payload.recipient,
            entity_type = payload.entity_type,
            entity_id = %payload.entity_id,
            kind = payload.kind,
            "notification (no transport configured)"
        );
        Ok(())
    }
}
