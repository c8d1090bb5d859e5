//! Kind-keyed event routing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use taskhub_core::{Envelope, MutationEvent};
use tracing::debug;

type Handler = Arc<dyn Fn(&MutationEvent) + Send + Sync>;

/// Routes inbound envelopes to handlers registered for their kind.
///
/// Handlers run inline on the subscription task and should not block.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl EventDispatcher {
    /// Empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`. Several handlers may share a kind.
    pub fn on<F>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&MutationEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Whether any handler is registered for `kind`.
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.read().contains_key(kind)
    }

    /// Deliver an envelope. Returns `false` when no handler knows its kind.
    pub fn dispatch(&self, envelope: Envelope) -> bool {
        let handlers = self.handlers.read().get(&envelope.kind).cloned();
        let Some(handlers) = handlers else {
            debug!(kind = %envelope.kind, "no handler for event kind, discarding");
            return false;
        };
        let event = MutationEvent::from_envelope(envelope);
        for handler in &handlers {
            handler(&event);
        }
        true
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.handlers.read().keys().cloned().collect();
        f.debug_struct("EventDispatcher").field("kinds", &kinds).finish()
    }
}
