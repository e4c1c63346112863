//! Request logging and health tracking, dispatched off the request path.
//!
//! Events go through a bounded queue to a single worker. A full queue drops
//! the event; a failed store write is logged. Neither ever reaches the caller.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::store::{HealthObservation, IntegrationStore, RequestLogEntry};

pub const QUEUE_CAPACITY: usize = 1024;

enum TelemetryEvent {
    Request(RequestLogEntry),
    Health(HealthObservation),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct Telemetry {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl Telemetry {
    pub fn spawn(store: Arc<dyn IntegrationStore>) -> Self {
        Self::with_capacity(store, QUEUE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn IntegrationStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(store, rx));
        Self { tx }
    }

    pub fn log_request(&self, entry: RequestLogEntry) {
        self.dispatch(TelemetryEvent::Request(entry));
    }

    pub fn record_health(&self, observation: HealthObservation) {
        self.dispatch(TelemetryEvent::Health(observation));
    }

    /// Waits until every event queued before this call has been written.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(TelemetryEvent::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    fn dispatch(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Telemetry queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Telemetry worker stopped, dropping event");
            }
        }
    }
}

async fn run_worker(store: Arc<dyn IntegrationStore>, mut rx: mpsc::Receiver<TelemetryEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            TelemetryEvent::Request(entry) => {
                if let Err(e) = store.append_request_log(&entry).await {
                    warn!(
                        "Failed to write request log for {} {}: {}",
                        entry.provider, entry.endpoint, e
                    );
                }
            }
            TelemetryEvent::Health(observation) => {
                if let Err(e) = store.upsert_health(&observation).await {
                    warn!("Failed to update health for {}: {}", observation.provider, e);
                }
            }
            TelemetryEvent::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Telemetry worker exiting");
}
