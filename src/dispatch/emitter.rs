use tokio::sync::mpsc;

use crate::error::HookdError;

/// An event occurrence handed off by a domain service
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Fire-and-forget boundary between event producers and the dispatcher.
///
/// Producers call emit() and return immediately; delivery outcomes are only
/// observable through the ledger. The emitter never fails because a
/// subscriber is unreachable.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<QueuedEvent>,
}

impl EventEmitter {
    /// Announce an event. The only rejected input is an empty event name.
    pub fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), HookdError> {
        if event.trim().is_empty() {
            return Err(HookdError::Validation(
                "event name must not be empty".to_string(),
            ));
        }

        if self
            .tx
            .send(QueuedEvent {
                event: event.to_string(),
                payload,
            })
            .is_err()
        {
            // Dispatcher has shut down; producers still must not fail
            tracing::warn!(event, "Dispatcher stopped, dropping event");
        }
        Ok(())
    }
}

/// Create the emitter and the receiving end for the dispatcher task
pub fn event_channel() -> (EventEmitter, mpsc::UnboundedReceiver<QueuedEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventEmitter { tx }, rx)
}
