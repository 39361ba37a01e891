use hdcore::types::ConversationId;
use log::debug;
use thiserror::Error;

use crate::api::ApiError;
use crate::client::Client;

/// Send failures surfaced to the caller. The drafted content is never
/// consumed on failure, so callers can offer a retry without losing it.
#[derive(Debug, Error)]
pub enum SendError {
    /// Content was empty after trimming; nothing was sent.
    #[error("message content is empty")]
    EmptyContent,
    /// The server rejected the message or the transport failed mid-send.
    #[error("send failed: {0}")]
    Failed(#[from] ApiError),
}

impl Client {
    /// Submits a user-authored message.
    ///
    /// Acceptance means the server persisted it, not that the sender's own
    /// view has it yet: the message reaches the views through its echo frame
    /// on the push channel, deduplicated like any other arrival. Nothing is
    /// retried automatically.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<(), SendError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SendError::EmptyContent);
        }
        self.api().send_message(conversation_id, content).await?;
        debug!(target: "Client", "message accepted for conversation {conversation_id}");
        Ok(())
    }
}
