//! # Background E-mail Dispatch
//!
//! The asynchronous delivery boundary for the e-mail channel. Payloads are
//! queued on an unbounded channel and delivered by a background task;
//! the transition response never waits on delivery and never observes a
//! delivery failure. Failures are logged and counted for the operator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use erogo_notify::{DeliveryChannel, NotificationPayload, NotificationSink};
use tokio::sync::mpsc;

/// Handle to the background e-mail worker.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::UnboundedSender<NotificationPayload>,
    failures: Arc<AtomicU64>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("failures", &self.failure_count())
            .finish()
    }
}

impl Mailer {
    /// Spawn the worker task delivering to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
        let failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&failures);

        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(e) = sink.deliver(DeliveryChannel::Email, &payload) {
                    worker_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        recipient = %payload.recipient,
                        entity_id = %payload.entity_id,
                        kind = payload.kind,
                        error = %e,
                        "e-mail notification delivery failed"
                    );
                }
            }
            tracing::debug!("mailer worker stopped: queue closed");
        });

        Self { tx, failures }
    }

    /// Queue a payload for delivery. Never blocks; a closed queue is
    /// logged and counted, not surfaced.
    pub fn enqueue(&self, payload: NotificationPayload) {
        if self.tx.send(payload).is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!("mailer queue closed; dropping notification");
        }
    }

    /// Number of deliveries that failed or were dropped.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
