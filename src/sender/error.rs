use thiserror::Error;

use crate::codec::CodecError;

/// Errors returned when handing work to the send loop.
#[derive(Debug, Error)]
pub enum SendError {
    /// The send loop has stopped and accepts no further work.
    #[error("sender closed")]
    Closed,
    /// The outbound queue was at capacity.
    #[error("send queue full")]
    QueueFull,
    /// The object could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
