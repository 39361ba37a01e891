// Re-export core modules for compatibility
pub use hdcore::{net, reconcile, store};

// Core types are re-exported, but the EventBus stays here with the runtime glue
pub mod types {
    pub use hdcore::types::*;
    pub mod events;
}

pub mod api;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod send;
pub mod session;
pub mod transport;
