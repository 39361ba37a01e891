use std::collections::HashSet;

use log::debug;

use crate::reconcile::{Applied, Origin, Reconciler};
use crate::types::{ConversationId, Message, MessageId};

/// The ordered message sequence of the one currently open conversation.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub(crate) conversation_id: ConversationId,
    pub(crate) messages: Vec<Message>,
    pub(crate) ids: HashSet<MessageId>,
}

impl ThreadState {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Owner of the scoped [`ThreadState`] binding. A binding is (re)created on
/// every thread-view activation and released on exit; frames that arrive for
/// a released or different binding are silently discarded.
#[derive(Debug)]
pub struct ThreadStore {
    state: Option<ThreadState>,
    reconciler: Reconciler,
}

impl ThreadStore {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            state: None,
            reconciler,
        }
    }

    /// Binds the store to a conversation and loads its fetched history,
    /// replacing any previous binding wholesale. History may arrive in any
    /// order (the server reports newest first); the result is ascending.
    pub fn bind(&mut self, conversation_id: ConversationId, history: Vec<Message>) {
        let mut state = ThreadState::new(conversation_id);
        for message in history {
            self.reconciler
                .apply_to_thread(&mut state, message, Origin::History);
        }
        self.state = Some(state);
    }

    /// Drops the current binding. Returns whether one existed.
    pub fn release(&mut self) -> bool {
        self.state.take().is_some()
    }

    pub fn bound(&self) -> Option<ConversationId> {
        self.state.as_ref().map(ThreadState::conversation_id)
    }

    /// Folds one message into the bound thread via the reconciliation
    /// engine.
    pub fn apply(&mut self, message: Message, origin: Origin) -> Applied {
        let Some(state) = self.state.as_mut() else {
            debug!(target: "Store", "no thread bound, dropping message {}", message.id);
            return Applied::OutOfScope;
        };
        if message.conversation_id != state.conversation_id {
            debug!(
                target: "Store",
                "message {} is for conversation {}, thread is bound to {}",
                message.id, message.conversation_id, state.conversation_id
            );
            return Applied::OutOfScope;
        }
        self.reconciler.apply_to_thread(state, message, origin)
    }

    /// The current ordered view for rendering; empty when nothing is bound.
    pub fn snapshot(&self) -> Vec<Message> {
        self.state
            .as_ref()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }
}
