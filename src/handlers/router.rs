use super::traits::FrameHandler;
use crate::client::Client;
use hdcore::types::events::Frame;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Central router for dispatching push frames to their handlers.
///
/// The router maintains a registry of handlers keyed by the frame `type`
/// value and dispatches each incoming frame to the matching handler.
pub struct FrameRouter {
    handlers: HashMap<&'static str, Arc<dyn FrameHandler>>,
}

impl FrameRouter {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a frame kind.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same kind to
    /// prevent accidental overwrites during initialization.
    pub fn register(&mut self, handler: Arc<dyn FrameHandler>) {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_some() {
            panic!("Handler for frame kind '{}' already registered", kind);
        }
    }

    /// Dispatch a frame to its handler. Returns `true` when a handler
    /// consumed the frame; unknown kinds are skipped with a debug log so a
    /// newer server does not break an older client.
    pub async fn dispatch(&self, client: Arc<Client>, frame: &Frame) -> bool {
        if let Some(handler) = self.handlers.get(frame.kind()) {
            handler.handle(client, frame).await
        } else {
            debug!(target: "Client", "no handler for frame kind {:?}", frame.kind());
            false
        }
    }

    /// Get the number of registered handlers (useful for testing).
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for FrameRouter {
    fn default() -> Self {
        Self::new()
    }
}
