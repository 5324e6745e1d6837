use crate::errors::SessionError;
use crate::protocol::FrameMessage;

/// Outbound side of a student connection, as seen by the capture loop.
pub trait FrameSink: Send + Sync {
    /// Whether the underlying channel is open right now.
    fn is_open(&self) -> bool;

    /// Queue one frame for transmission.
    fn send_frame(&self, frame: FrameMessage) -> Result<(), SessionError>;
}
