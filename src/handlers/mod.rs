pub mod message;
pub mod router;
pub mod traits;

pub use message::MessageHandler;
pub use router::FrameRouter;
pub use traits::FrameHandler;
