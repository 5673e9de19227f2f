//! Web domain event sink implementation.

use std::sync::{Arc, Mutex};

use pocketbook_core::{
    events::{DomainEvent, DomainEventSink},
    Engine,
};
use tokio::sync::mpsc;

use super::queue_worker::event_queue_worker;

/// Domain event sink for the web server runtime.
///
/// The engine needs the sink at construction and the worker needs the
/// engine, so initialization is two-phase:
///
/// 1. `new()` creates the channel; events are buffered from then on.
/// 2. `start_worker()` spawns the worker once the engine exists.
pub struct WebDomainEventSink {
    tx: mpsc::UnboundedSender<DomainEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<DomainEvent>>>,
}

impl WebDomainEventSink {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Spawns the worker. Later calls are ignored.
    pub fn start_worker(&self, engine: &Arc<Engine>) {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        match rx {
            Some(rx) => {
                tokio::spawn(event_queue_worker(rx, Arc::downgrade(engine)));
            }
            None => tracing::warn!("Domain event worker already started"),
        }
    }
}

impl Default for WebDomainEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainEventSink for WebDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Domain event dropped, worker stopped");
        }
    }
}
