use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;

use crate::reconcile::{Applied, Origin, Reconciler};
use crate::types::{Conversation, ConversationId, Message, MessageId};

/// Book-keeping the chat list holds per conversation on top of what the
/// server returned.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub(crate) conversation: Conversation,
    /// Last-activity key at load time. Events at or below this key are
    /// already reflected in the server-computed summary and unread count.
    pub(crate) baseline: Option<(DateTime<Utc>, MessageId)>,
    /// Message ids applied from events since the last load.
    pub(crate) applied: HashSet<MessageId>,
}

impl ConversationEntry {
    fn new(conversation: Conversation) -> Self {
        let baseline = conversation.activity_key();
        Self {
            conversation,
            baseline,
            applied: HashSet::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

/// The set of conversations visible to the user, with a derived ordering by
/// most recent activity.
#[derive(Debug, Clone, Default)]
pub struct ChatListState {
    pub(crate) entries: HashMap<ConversationId, ConversationEntry>,
}

impl ChatListState {
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            entries: conversations
                .into_iter()
                .map(|c| (c.id, ConversationEntry::new(c)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.entries.get(&id).map(|e| &e.conversation)
    }

    /// Conversations ordered by last activity, most recent first. Ones that
    /// never had a message sort last, by id for determinism.
    pub fn snapshot(&self) -> Vec<Conversation> {
        let mut conversations: Vec<_> =
            self.entries.values().map(|e| e.conversation.clone()).collect();
        conversations.sort_by(|a, b| {
            b.activity_key()
                .cmp(&a.activity_key())
                .then_with(|| a.id.cmp(&b.id))
        });
        conversations
    }
}

/// Exclusive owner of [`ChatListState`]. Every operation is synchronous over
/// already-resident state; network activity lives in the transport client
/// and the event channel.
#[derive(Debug)]
pub struct ChatListStore {
    state: ChatListState,
    reconciler: Reconciler,
    active_thread: Option<ConversationId>,
    loaded: bool,
    released: bool,
}

impl ChatListStore {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            state: ChatListState::default(),
            reconciler,
            active_thread: None,
            loaded: false,
            released: false,
        }
    }

    /// Replaces the list wholesale with a fresh fetch. Unread baselines are
    /// reset to the server's view; the active thread, if any, stays read.
    pub fn load(&mut self, conversations: Vec<Conversation>) {
        if self.released {
            debug!(target: "Store", "chat list released, dropping load");
            return;
        }
        self.state = ChatListState::from_conversations(conversations);
        self.loaded = true;
        if let Some(id) = self.active_thread
            && let Some(entry) = self.state.entries.get_mut(&id)
        {
            entry.conversation.unread_count = 0;
        }
    }

    /// Folds one message into the list via the reconciliation engine.
    pub fn apply(&mut self, message: &Message, origin: Origin) -> Applied {
        if self.released {
            debug!(target: "Store", "chat list released, dropping message {}", message.id);
            return Applied::OutOfScope;
        }
        self.reconciler
            .apply_to_chat_list(&mut self.state, message, origin, self.active_thread)
    }

    /// Marks a thread as the active view; entering one zeroes its unread
    /// counter. `None` when the user leaves the thread view.
    pub fn set_active_thread(&mut self, conversation: Option<ConversationId>) {
        if self.released {
            return;
        }
        self.active_thread = conversation;
        if let Some(id) = conversation
            && let Some(entry) = self.state.entries.get_mut(&id)
        {
            entry.conversation.unread_count = 0;
        }
    }

    pub fn active_thread(&self) -> Option<ConversationId> {
        self.active_thread
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.state.get(id)
    }

    pub fn snapshot(&self) -> Vec<Conversation> {
        self.state.snapshot()
    }

    /// Ends the session scope. Later loads and frames are silently dropped.
    pub fn release(&mut self) {
        self.released = true;
        self.state.entries.clear();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
