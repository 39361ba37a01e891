pub mod chat;
pub mod events;
pub mod message;

pub use chat::{Conversation, LastMessage, Participant};
pub use message::{ConversationId, Message, MessageId, UserId};
