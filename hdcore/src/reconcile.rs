//! The single merge path shared by the chat-list and thread stores.
//!
//! History fetches and push frames race freely; the server is the ordering
//! authority through message timestamps and identifiers. Applying a message
//! here is idempotent and commutative: replaying any permutation, with
//! duplicates, of the same message set converges on the same store state.

use crate::store::{ChatListState, ThreadState};
use crate::types::{ConversationId, LastMessage, Message, UserId};

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// One-shot history fetch over the request/response boundary.
    History,
    /// Live frame from the push channel.
    Event,
}

/// Result of applying one message to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Newly reflected in the store.
    Inserted,
    /// The store already accounted for this message; nothing changed.
    Duplicate,
    /// The message does not belong to anything the store currently holds
    /// (unknown conversation, or a different thread is bound). Dropped
    /// without mutation.
    OutOfScope,
}

/// Applies incoming messages to store state. Holds nothing beyond the
/// viewing user's identity, which decides unread-count effects.
#[derive(Debug, Clone)]
pub struct Reconciler {
    viewer: UserId,
}

impl Reconciler {
    pub fn new(viewer: UserId) -> Self {
        Self { viewer }
    }

    pub fn viewer(&self) -> UserId {
        self.viewer
    }

    /// Merges a message into an open thread, preserving ascending
    /// `(created_at, id)` order. A message whose id is already present is a
    /// no-op regardless of origin, which covers an event arriving for a
    /// message the history fetch already delivered, and double delivery.
    pub fn apply_to_thread(
        &self,
        thread: &mut ThreadState,
        message: Message,
        _origin: Origin,
    ) -> Applied {
        if message.conversation_id != thread.conversation_id {
            return Applied::OutOfScope;
        }
        if !thread.ids.insert(message.id) {
            return Applied::Duplicate;
        }
        let pos = thread
            .messages
            .binary_search_by(|m| m.sort_key().cmp(&message.sort_key()))
            .unwrap_or_else(|pos| pos);
        thread.messages.insert(pos, message);
        Applied::Inserted
    }

    /// Folds a message into the chat list: updates the conversation's
    /// last-message summary when the message is now the most recent, and
    /// bumps the unread counter for a live event from someone else while the
    /// thread is not the active view.
    ///
    /// Messages at or below the load-time baseline key are already reflected
    /// in the server-computed summary and unread count; they and any id seen
    /// before are no-ops, so reordered or repeated delivery converges.
    pub fn apply_to_chat_list(
        &self,
        list: &mut ChatListState,
        message: &Message,
        origin: Origin,
        active_thread: Option<ConversationId>,
    ) -> Applied {
        let Some(entry) = list.entries.get_mut(&message.conversation_id) else {
            return Applied::OutOfScope;
        };

        let key = message.sort_key();
        if entry.applied.contains(&message.id) {
            return Applied::Duplicate;
        }
        if entry.baseline.is_some_and(|baseline| key <= baseline) {
            return Applied::Duplicate;
        }
        entry.applied.insert(message.id);

        let newest = entry
            .conversation
            .activity_key()
            .is_none_or(|current| key > current);
        if newest {
            let sender_name = entry
                .conversation
                .participant_name(message.sender_id)
                .unwrap_or_default()
                .to_string();
            entry.conversation.last_message = Some(LastMessage {
                message_id: message.id,
                sender_id: message.sender_id,
                sender_name,
                content: message.content.clone(),
                created_at: message.created_at,
            });
        }

        if origin == Origin::Event
            && message.sender_id != self.viewer
            && active_thread != Some(message.conversation_id)
        {
            entry.conversation.unread_count += 1;
        }

        Applied::Inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Conversation, MessageId, Participant};
    use chrono::{TimeZone, Utc};

    const VIEWER: UserId = 7;

    fn make_message(id: MessageId, timestamp_secs: i64) -> Message {
        Message {
            id,
            conversation_id: 1,
            sender_id: 42,
            content: format!("Message {}", id),
            created_at: Utc.timestamp_opt(timestamp_secs, 0).unwrap(),
        }
    }

    fn make_conversation(id: ConversationId) -> Conversation {
        Conversation {
            id,
            name: "Ada".to_string(),
            participants: vec![Participant {
                id: 42,
                name: "Ada".to_string(),
                photo_url: None,
            }],
            last_message: None,
            unread_count: 0,
        }
    }

    fn list_with(conversations: Vec<Conversation>) -> ChatListState {
        ChatListState::from_conversations(conversations)
    }

    #[test]
    fn thread_messages_ordered_when_applied_out_of_order() {
        let reconciler = Reconciler::new(VIEWER);
        let mut thread = ThreadState::new(1);

        // Arrival order scrambled relative to creation order.
        for (id, ts) in [(5, 5000), (2, 2000), (8, 8000), (1, 1000), (4, 4000)] {
            assert_eq!(
                reconciler.apply_to_thread(&mut thread, make_message(id, ts), Origin::Event),
                Applied::Inserted
            );
        }

        let ids: Vec<_> = thread.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 4, 5, 8]);
        for pair in thread.messages().windows(2) {
            assert!(pair[0].sort_key() < pair[1].sort_key());
        }
    }

    #[test]
    fn thread_same_timestamp_breaks_ties_by_id() {
        let reconciler = Reconciler::new(VIEWER);
        let mut thread = ThreadState::new(1);

        for id in [3, 1, 2] {
            reconciler.apply_to_thread(&mut thread, make_message(id, 1000), Origin::History);
        }

        let ids: Vec<_> = thread.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn thread_apply_is_idempotent_across_origins() {
        let reconciler = Reconciler::new(VIEWER);
        let mut thread = ThreadState::new(1);

        assert_eq!(
            reconciler.apply_to_thread(&mut thread, make_message(3, 3000), Origin::History),
            Applied::Inserted
        );
        let before = thread.messages().to_vec();
        assert_eq!(
            reconciler.apply_to_thread(&mut thread, make_message(3, 3000), Origin::Event),
            Applied::Duplicate
        );
        assert_eq!(thread.messages(), &before[..]);
    }

    #[test]
    fn thread_rejects_other_conversations() {
        let reconciler = Reconciler::new(VIEWER);
        let mut thread = ThreadState::new(1);
        let mut foreign = make_message(3, 3000);
        foreign.conversation_id = 2;

        assert_eq!(
            reconciler.apply_to_thread(&mut thread, foreign, Origin::Event),
            Applied::OutOfScope
        );
        assert!(thread.is_empty());
    }

    #[test]
    fn event_from_other_user_bumps_unread_and_summary() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);
        let message = make_message(9, 9000);

        assert_eq!(
            reconciler.apply_to_chat_list(&mut list, &message, Origin::Event, None),
            Applied::Inserted
        );

        let conversation = list.get(1).unwrap();
        assert_eq!(conversation.unread_count, 1);
        let summary = conversation.last_message.as_ref().unwrap();
        assert_eq!(summary.message_id, 9);
        assert_eq!(summary.sender_name, "Ada");
        assert_eq!(summary.content, "Message 9");
    }

    #[test]
    fn own_messages_never_count_as_unread() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);
        let mut message = make_message(9, 9000);
        message.sender_id = VIEWER;

        reconciler.apply_to_chat_list(&mut list, &message, Origin::Event, None);

        let conversation = list.get(1).unwrap();
        assert_eq!(conversation.unread_count, 0);
        assert_eq!(conversation.last_message.as_ref().unwrap().message_id, 9);
    }

    #[test]
    fn active_thread_suppresses_unread() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);

        reconciler.apply_to_chat_list(&mut list, &make_message(9, 9000), Origin::Event, Some(1));

        assert_eq!(list.get(1).unwrap().unread_count, 0);
    }

    #[test]
    fn history_origin_never_counts_as_unread() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);

        reconciler.apply_to_chat_list(&mut list, &make_message(9, 9000), Origin::History, None);

        assert_eq!(list.get(1).unwrap().unread_count, 0);
    }

    #[test]
    fn event_for_message_already_in_summary_is_noop() {
        let reconciler = Reconciler::new(VIEWER);
        let mut conversation = make_conversation(1);
        conversation.last_message = Some(LastMessage {
            message_id: 5,
            sender_id: 42,
            sender_name: "Ada".to_string(),
            content: "Message 5".to_string(),
            created_at: Utc.timestamp_opt(5000, 0).unwrap(),
        });
        conversation.unread_count = 2;
        let mut list = list_with(vec![conversation]);

        assert_eq!(
            reconciler.apply_to_chat_list(&mut list, &make_message(5, 5000), Origin::Event, None),
            Applied::Duplicate
        );

        let conversation = list.get(1).unwrap();
        assert_eq!(conversation.unread_count, 2);
        assert_eq!(conversation.last_message.as_ref().unwrap().message_id, 5);
    }

    #[test]
    fn unread_converges_under_reordered_events() {
        let reconciler = Reconciler::new(VIEWER);
        let batch = [make_message(8, 8000), make_message(9, 9000)];

        let mut forward = list_with(vec![make_conversation(1)]);
        for message in &batch {
            reconciler.apply_to_chat_list(&mut forward, message, Origin::Event, None);
        }

        let mut backward = list_with(vec![make_conversation(1)]);
        for message in batch.iter().rev() {
            reconciler.apply_to_chat_list(&mut backward, message, Origin::Event, None);
        }

        let a = forward.get(1).unwrap();
        let b = backward.get(1).unwrap();
        assert_eq!(a.unread_count, 2);
        assert_eq!(a.unread_count, b.unread_count);
        assert_eq!(a.last_message, b.last_message);
    }

    #[test]
    fn duplicate_event_delivery_counts_once() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);
        let message = make_message(9, 9000);

        reconciler.apply_to_chat_list(&mut list, &message, Origin::Event, None);
        assert_eq!(
            reconciler.apply_to_chat_list(&mut list, &message, Origin::Event, None),
            Applied::Duplicate
        );

        assert_eq!(list.get(1).unwrap().unread_count, 1);
    }

    #[test]
    fn older_event_does_not_rewrite_summary() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);

        reconciler.apply_to_chat_list(&mut list, &make_message(9, 9000), Origin::Event, None);
        reconciler.apply_to_chat_list(&mut list, &make_message(8, 8000), Origin::Event, None);

        let conversation = list.get(1).unwrap();
        assert_eq!(conversation.last_message.as_ref().unwrap().message_id, 9);
        assert_eq!(conversation.unread_count, 2);
    }

    #[test]
    fn unknown_conversation_is_out_of_scope() {
        let reconciler = Reconciler::new(VIEWER);
        let mut list = list_with(vec![make_conversation(1)]);
        let mut message = make_message(9, 9000);
        message.conversation_id = 99;

        assert_eq!(
            reconciler.apply_to_chat_list(&mut list, &message, Origin::Event, None),
            Applied::OutOfScope
        );
    }
}
