//! Canonical error types for the crate.
//!
//! Component-level errors live next to their components; this module holds
//! the facade's [`TransportError`] and the [`WorkerError`] that ends a
//! receive session.

use std::io;

use thiserror::Error;

use crate::{codec::CodecError, config::ConfigError, fragment::FragmentError, sender::SendError};

/// Errors surfaced by [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Creating or configuring a socket failed.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// An outbound object could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Sending was stopped.
    #[error("sender closed")]
    SenderClosed,
    /// Receiving was stopped and cannot be restarted.
    #[error("receiver closed")]
    ReceiverClosed,
}

impl From<SendError> for TransportError {
    fn from(error: SendError) -> Self {
        match error {
            SendError::Codec(e) => Self::Codec(e),
            SendError::Closed | SendError::QueueFull => Self::SenderClosed,
        }
    }
}

/// Fatal errors ending the Reassembler loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A datagram did not decode into a valid fragment.
    #[error("malformed datagram: {0}")]
    Fragment(#[from] FragmentError),
    /// A completed object did not decode.
    #[error("malformed object: {0}")]
    Codec(#[from] CodecError),
}
