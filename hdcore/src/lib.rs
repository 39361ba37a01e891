//! Platform-independent core of the conversation synchronization engine:
//! the data model, the reconciliation logic, the chat-list and thread stores
//! and the traits the I/O edges are implemented against.

pub mod net;
pub mod reconcile;
pub mod store;
pub mod types;
