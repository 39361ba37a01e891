use crate::client::Client;
use async_trait::async_trait;
use hdcore::types::events::Frame;
use std::sync::Arc;

/// Trait for handling one kind of push frame.
///
/// Each handler owns one value of the frame `type` field. The pattern keeps
/// event kinds additive: a new kind means registering another handler, not
/// growing a match in the routing loop.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Returns the frame kind this handler is responsible for.
    fn kind(&self) -> &'static str;

    /// Asynchronously handle the incoming frame.
    ///
    /// Returns `true` if the frame was consumed, `false` if it should be
    /// logged as unhandled.
    async fn handle(&self, client: Arc<Client>, frame: &Frame) -> bool;
}
