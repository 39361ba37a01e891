use super::traits::FrameHandler;
use crate::client::Client;
use async_trait::async_trait;
use hdcore::types::events::{Frame, MESSAGE_FRAME_KIND};
use std::sync::Arc;

/// Applies message frames to the chat-list and thread stores and
/// republishes the result on the event bus.
pub struct MessageHandler;

#[async_trait]
impl FrameHandler for MessageHandler {
    fn kind(&self) -> &'static str {
        MESSAGE_FRAME_KIND
    }

    async fn handle(&self, client: Arc<Client>, frame: &Frame) -> bool {
        let Frame::Message(message) = frame else {
            return false;
        };
        client.apply_message_frame(message).await;
        true
    }
}
