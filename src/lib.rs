#![doc(html_root_url = "https://docs.rs/rmcast/latest")]
//! Public API for the `rmcast` library.
//!
//! This crate moves arbitrarily large objects between processes over UDP
//! multicast. Objects are serialized, compressed and sliced into fragments;
//! receivers reassemble them, ask the group for what they miss and abandon
//! objects that cannot be recovered.

pub mod codec;
pub mod config;
pub mod error;
pub mod fragment;
pub mod integrity;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod net;
pub mod reassembler;
pub mod records;
pub mod retransmit;
pub mod sender;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use codec::{CodecError, EncodedObject};
pub use config::{ConfigError, ProtocolConfig, TransportConfig};
pub use error::{TransportError, WorkerError};
pub use fragment::{
    ChannelId,
    Fragment,
    FragmentBatch,
    FragmentError,
    FragmentHeader,
    FragmentIndex,
    FragmentationError,
    Fragmenter,
    ObjectId,
    OriginTag,
    TypeTag,
};
pub use integrity::{IntegrityChecker, SweepReport};
pub use message::{Message, Payload};
pub use net::{DatagramSink, DatagramSource};
pub use reassembler::{Reassembler, ReassemblyTable};
pub use retransmit::RetransmitRequest;
pub use sender::{RetransmitCache, SendError, SenderHandle};
pub use transport::Transport;
