use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConversationId = u64;
pub type MessageId = u64;
pub type UserId = u64;

/// A single message as the server reports it. Identifiers and the creation
/// timestamp are server-assigned; the timestamp (with the id as tie-break)
/// is the ordering authority within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Ordering key within a conversation.
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}
