//! Error types emitted by the fragment layer.
//!
//! Wire-level failures and slicing failures are kept apart so callers can
//! tell malformed traffic from local misconfiguration.

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use super::FragmentIndex;

/// Errors produced while encoding, decoding or validating a [`Fragment`](crate::fragment::Fragment).
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Serialisation of the fragment failed.
    #[error("failed to encode fragment: {0}")]
    Encode(#[from] EncodeError),
    /// The encoded fragment does not fit in one datagram.
    #[error("encoded fragment of {len} bytes exceeds the datagram limit")]
    Oversized { len: usize },
    /// The datagram could not be decoded into a fragment.
    #[error("failed to decode fragment: {0}")]
    Decode(#[from] DecodeError),
    /// The datagram carried bytes past the end of the fragment.
    #[error("fragment followed by {trailing} trailing bytes")]
    TrailingBytes { trailing: usize },
    /// The fragment position does not fit the advertised fragment count.
    #[error("fragment index {index} out of range for total {total}")]
    IndexOutOfRange { index: FragmentIndex, total: u32 },
}

/// Errors produced while slicing an outbound object into fragments.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The object needs more fragments than a `u32` index can address.
    #[error("object requires {count} fragments, exceeding the index range")]
    TooManyFragments { count: usize },
}
