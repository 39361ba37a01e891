use std::sync::Arc;
use tokio::sync::broadcast;

pub use hdcore::types::events::*;

use hdcore::types::{Conversation, Message};

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus that provides separate broadcast channels for
        /// each event type the engine surfaces to its embedder.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

// Define the EventBus structure and implementation using the macro
define_event_bus! {
    // Channel lifecycle
    (connected, Arc<Connected>),
    (disconnected, Arc<Disconnected>),

    // Store updates
    (message, Arc<Message>),
    (conversation_updated, Arc<Conversation>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
