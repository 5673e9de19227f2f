//! Domain event sink trait and implementations.

use std::sync::{Arc, Mutex};

use super::DomainEvent;

/// Receives domain events after successful mutations.
///
/// `emit()` is called while the caller may still hold ledger locks, so it
/// must not block or fail. Delivery is best-effort.
pub trait DomainEventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);

    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Collects events in memory for assertions in tests.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of collected events with the given [`DomainEvent::kind`].
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_does_not_panic() {
        let sink = NoOpDomainEventSink;
        sink.emit(DomainEvent::bills_changed(vec!["b1".to_string()]));
        sink.emit_batch(vec![DomainEvent::LedgerResumed, DomainEvent::ledger_halted("drift")]);
    }

    #[test]
    fn test_mock_sink_collects_events() {
        let sink = MockDomainEventSink::new();
        assert!(sink.is_empty());

        sink.emit(DomainEvent::transfer_completed("a", "b", 100));
        sink.emit_batch(vec![
            DomainEvent::sync_failed("s1", "timeout"),
            DomainEvent::transfer_completed("b", "a", 100),
        ]);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_kind("transfer_completed"), 2);

        sink.clear();
        assert!(sink.is_empty());
    }
}
