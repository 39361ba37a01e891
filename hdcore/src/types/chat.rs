use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{ConversationId, MessageId, UserId};

/// One member of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Summary of the most recent activity in a conversation, as shown in the
/// chat list. Carries the message id so a later event for the same message
/// can be recognized without holding the full sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl LastMessage {
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.message_id)
    }
}

/// A named or direct conversation visible to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub name: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// Key used for the chat-list ordering (most recent activity first).
    pub fn activity_key(&self) -> Option<(DateTime<Utc>, MessageId)> {
        self.last_message.as_ref().map(LastMessage::sort_key)
    }

    /// Display name of a participant, if the conversation knows them.
    pub fn participant_name(&self, id: UserId) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
    }
}
