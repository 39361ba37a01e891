use serde::Serialize;
use thiserror::Error;

use super::message::Message;

/// The `type` value of a new-message frame. Frames without a `type` field
/// are treated as message frames; the field exists so new event kinds can be
/// introduced without breaking older clients.
pub const MESSAGE_FRAME_KIND: &str = "message";

/// One discrete push-delivered event payload.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A message the server has just persisted.
    Message(Message),
    /// A frame kind this client does not understand. Skipped by routing.
    Other { kind: String },
}

impl Frame {
    pub fn kind(&self) -> &str {
        match self {
            Frame::Message(_) => MESSAGE_FRAME_KIND,
            Frame::Other { kind } => kind,
        }
    }

    /// Decodes one raw frame payload.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_slice(raw)?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or(MESSAGE_FRAME_KIND);
        if kind == MESSAGE_FRAME_KIND {
            Ok(Frame::Message(serde_json::from_value(value)?))
        } else {
            Ok(Frame::Other {
                kind: kind.to_string(),
            })
        }
    }

    /// Encodes a message the way the push boundary frames it.
    pub fn encode_message(message: &Message) -> Result<String, FrameError> {
        #[derive(Serialize)]
        struct Wire<'a> {
            r#type: &'static str,
            #[serde(flatten)]
            message: &'a Message,
        }
        Ok(serde_json::to_string(&Wire {
            r#type: MESSAGE_FRAME_KIND,
            message,
        })?)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("undecodable frame payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Emitted when the push channel reaches the connected state.
#[derive(Debug, Clone)]
pub struct Connected {
    /// True when this connection follows an earlier drop within the same
    /// session. Frames emitted during the gap are gone; subscribers restore
    /// consistency by re-running their history fetch.
    pub resumed: bool,
}

/// Emitted when the push connection is lost or torn down.
#[derive(Debug, Clone)]
pub struct Disconnected {
    pub will_retry: bool,
}
