//! Error kinds surfaced by the engine, re-exported in one place.

pub use crate::api::ApiError;
pub use crate::channel::ChannelError;
pub use crate::send::SendError;
pub use hdcore::types::events::FrameError;
