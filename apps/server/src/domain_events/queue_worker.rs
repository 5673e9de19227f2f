//! Event queue worker for processing domain events.
//!
//! Receives events from an mpsc channel, debounces them with a 500ms window,
//! then processes each batch.

use std::sync::Weak;
use std::time::Duration;

use pocketbook_core::{events::DomainEvent, Engine};
use tokio::sync::mpsc;

use super::planner::plan_batch;

/// Debounce window for collecting events before processing.
const DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Runs until every sender is dropped or the engine is gone.
pub async fn event_queue_worker(mut rx: mpsc::UnboundedReceiver<DomainEvent>, engine: Weak<Engine>) {
    tracing::info!("Domain event queue worker started");

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let deadline = tokio::time::sleep(DEBOUNCE_DURATION);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(e) => batch.push(e),
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }

        let Some(engine) = engine.upgrade() else {
            break;
        };
        process_event_batch(&batch, &engine).await;
    }

    tracing::info!("Domain event queue worker stopped");
}

async fn process_event_batch(events: &[DomainEvent], engine: &Engine) {
    for event in events {
        tracing::debug!(kind = event.kind(), "domain event");
    }

    let plan = plan_batch(events);
    if let Some(reason) = plan.halted {
        tracing::error!("Ledger halted, mutations blocked until reconciled: {}", reason);
    }
    if plan.refresh_ledger {
        if let Err(e) = engine.refresh(false).await {
            tracing::warn!("Post-mutation ledger refresh failed: {}", e);
        }
    }
}
